//! Scripted service clients for pipeline tests.
//!
//! Both clients answer from a per-key script first and fall back to a
//! well-formed default, so a test only scripts the calls it cares about.
//! Every call is counted and every LLM request is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use quarry::llm::{CompletionRequest, LlmClient};
use quarry::search::SearchClient;
use quarry::types::{RoleName, SearchHit, SearchQuery, ServiceError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<Value, ServiceError>;

/// LLM client answering from per-role reply queues.
///
/// When a role's queue is empty the client derives a valid reply from the
/// request itself: a fixed keyword list, a synthesis that labels every
/// cluster it was given, and a recommendation report citing `kw-1`.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<HashMap<RoleName, VecDeque<Reply>>>,
    delays: Mutex<HashMap<RoleName, Duration>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `role`
    pub fn push(self, role: RoleName, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue the same reply `times` times
    pub fn push_n(mut self, role: RoleName, times: usize, reply: Reply) -> Self {
        for _ in 0..times {
            self = self.push(role, reply.clone());
        }
        self
    }

    /// Make every call for `role` take `delay` (tokio time)
    pub fn with_delay(self, role: RoleName, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(role, delay);
        self
    }

    pub fn calls(&self, role: RoleName) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.role == role)
            .count()
    }

    pub fn requests(&self, role: RoleName) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.role == role)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = self.delays.lock().unwrap().get(&request.role).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| Ok(default_reply(request)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn default_reply(request: &CompletionRequest) -> Value {
    match request.role {
        RoleName::KeywordSpecialist => keyword_reply(),
        RoleName::SearchAnalyst => synthesis_reply(&request.context),
        RoleName::InsightsCompiler => recommendation_reply(),
    }
}

/// Five keywords, deliberately not in score order
pub fn keyword_reply() -> Value {
    json!({
        "concepts": ["autonomy", "frameworks", "coordination"],
        "keywords": [
            {"keyword": "autonomous agents", "score": 0.9, "rationale": "Core concept", "concept": "autonomy", "intent": "informational"},
            {"keyword": "AI agents", "score": 0.95, "rationale": "Head term", "concept": "autonomy", "intent": "informational"},
            {"keyword": "llm agent frameworks", "score": 0.85, "rationale": "Tooling searches", "concept": "frameworks", "intent": "commercial"},
            {"keyword": "multi-agent systems", "score": 0.8, "rationale": "Research angle", "concept": "coordination", "intent": "informational"},
            {"keyword": "agent orchestration", "score": 0.75, "rationale": "Operations angle", "concept": "coordination", "intent": "transactional"}
        ],
        "related_terms": ["agentic ai", "ai assistants"]
    })
}

/// Label every cluster in the request and rank items in reverse order
pub fn synthesis_reply(context: &Value) -> Value {
    let clusters: Vec<Value> = context["clusters"]
        .as_array()
        .map(|clusters| {
            clusters
                .iter()
                .map(|c| {
                    let id = c["cluster_id"].as_str().unwrap_or_default();
                    json!({
                        "cluster_id": id,
                        "label": format!("Group {}", id),
                        "summary": format!("Results grouped under {}", id),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut ranking: Vec<Value> = context["results"]
        .as_array()
        .map(|items| items.iter().map(|i| i["id"].clone()).collect())
        .unwrap_or_default();
    ranking.reverse();

    json!({
        "clusters": clusters,
        "ranking": ranking,
        "gaps": ["pricing comparisons"],
        "refinements": [
            {"keyword_id": "kw-2", "suggested_query": "autonomous ai agents examples", "reason": "too broad"}
        ]
    })
}

pub fn recommendation_reply() -> Value {
    json!({
        "summary": "Lead with the head term and support it with framework content.",
        "strategy": [
            {"priority": 2, "keyword_id": "kw-3", "recommendation": "Publish framework comparisons"},
            {"priority": 1, "keyword_id": "kw-1", "recommendation": "Own the head term"}
        ],
        "groups": [
            {"name": "Core", "keyword_ids": ["kw-1", "kw-2"]}
        ],
        "objectives": [
            {"objective": "find content gaps", "recommendation": "Cover pricing", "keyword_ids": ["kw-3"]}
        ],
        "evidence": [
            {"claim": "The head term dominates interest", "keyword_ids": ["kw-1"]}
        ]
    })
}

/// What a scripted query does on one call
#[derive(Clone)]
enum Behavior {
    Fail(ServiceError),
    FailTimes(usize, ServiceError),
}

/// Search client returning two deterministic hits per query.
///
/// Every query also returns a shared overview page, so merged results
/// always contain a duplicate to fold.
#[derive(Default)]
pub struct ScriptedSearchClient {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call for `query` fails with `error`
    pub fn failing(self, query: &str, error: ServiceError) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(query.to_string(), Behavior::Fail(error));
        self
    }

    /// The first `times` calls for `query` fail with `error`
    pub fn failing_times(self, query: &str, times: usize, error: ServiceError) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(query.to_string(), Behavior::FailTimes(times, error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, query: &str) -> usize {
        self.calls.lock().unwrap().get(query).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Most searches that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ServiceError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(query.text.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self.behaviors.lock().unwrap().get(&query.text).cloned();
        match behavior {
            Some(Behavior::Fail(error)) => return Err(error),
            Some(Behavior::FailTimes(times, error)) if call <= times => return Err(error),
            _ => {}
        }

        let slug = query.text.replace(' ', "-");
        Ok(vec![
            SearchHit {
                title: format!("{} guide", query.text),
                url: format!("https://www.example.com/{}/guide?utm_source=test", slug),
                snippet: format!("Everything about {}", query.text),
                position: 1,
            },
            SearchHit {
                title: "Agent landscape overview".to_string(),
                url: "https://docs.example.org/overview/".to_string(),
                snippet: "A map of the agent landscape".to_string(),
                position: 2,
            },
        ])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
