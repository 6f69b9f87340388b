//! Search analyst: tests the top keywords against a search service and
//! synthesizes what comes back.
//!
//! One attempt runs in three phases:
//!
//! 1. **Fan-out** - one query per top-K keyword on a [`JoinSet`], at most
//!    `worker_count` in flight. Each query retries on its own under the
//!    run's budget and returns a local result; nothing is shared.
//! 2. **Merge** - after the join, results are folded in keyword order,
//!    deduplicated by normalized URL and clustered.
//! 3. **Synthesis** - one completion labels the clusters, ranks items and
//!    names gaps and refinements.
//!
//! The findings of the first fan-out that yields any results are kept for
//! the rest of the run, so a retry after a failed or rejected synthesis
//! only repeats the completion.

use super::{AgentRole, RoleEnv};
use crate::llm::{CompletionRequest, LlmClient};
use crate::research::context::SearchInput;
use crate::research::retry::Budget;
use crate::schema::{shape_hint, SchemaValidator, SearchSynthesisDraft};
use crate::search::cluster::{cluster_items, merge_hits, DEFAULT_SIMILARITY_THRESHOLD};
use crate::search::{QueryOutcome, SearchClient, SearchFindings};
use crate::types::{
    Coverage, FailedQuery, KeywordEntry, RoleName, SearchAnalysisResult, SearchHit, SearchQuery,
    ServiceError, ValidationFailure,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = r#"Evaluate the effectiveness of the proposed keywords by analyzing the search results they returned.

1. Review the results each keyword returned.
2. Assess the relevance of the returned results and rank them, most relevant first.
3. Give every result cluster a short label and a one-paragraph summary.
4. Identify gaps: aspects of the topic the results do not cover, and irrelevant results.
5. Suggest query modifications that would improve search accuracy, naming the keyword id each one refines.

Refer to results, clusters and keywords only by the ids given in the input."#;

/// Search results requested per keyword query
pub const DEFAULT_RESULTS_PER_QUERY: usize = 10;

/// Unvalidated product of one search analyst attempt
#[derive(Debug, Clone)]
pub struct SearchDraft {
    pub findings: SearchFindings,
    pub synthesis: Value,
}

/// Terminal state of one keyword query
#[derive(Debug)]
struct QueryRun {
    index: usize,
    keyword_id: String,
    query: String,
    result: Result<Vec<SearchHit>, ServiceError>,
}

pub struct SearchAnalyst {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    worker_count: usize,
    top_k: usize,
    results_per_query: usize,
    findings: Mutex<Option<SearchFindings>>,
}

impl SearchAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchClient>) -> Self {
        Self {
            llm,
            search,
            worker_count: 4,
            top_k: 5,
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
            findings: Mutex::new(None),
        }
    }

    /// Maximum queries in flight at once (at least 1)
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Number of top keywords to search for (at least 1)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_results_per_query(mut self, results_per_query: usize) -> Self {
        self.results_per_query = results_per_query.max(1);
        self
    }

    /// Run one query per keyword and wait for all of them.
    ///
    /// Returns the runs in keyword order. An `Auth` failure on any query
    /// aborts the queries still in flight and fails the whole fan-out.
    async fn fan_out(
        &self,
        keywords: &[KeywordEntry],
        locale: Option<&str>,
        budget: Budget,
    ) -> Result<Vec<QueryRun>, ServiceError> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut set = JoinSet::new();

        for (index, entry) in keywords.iter().enumerate() {
            let client = Arc::clone(&self.search);
            let semaphore = Arc::clone(&semaphore);
            let keyword_id = entry.id.clone();
            let query = SearchQuery {
                text: entry.keyword.clone(),
                locale: locale.map(str::to_string),
                limit: self.results_per_query,
            };

            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let what = format!("search for '{}'", query.text);
                        budget
                            .call_with_retry(&what, || client.search(&query))
                            .await
                            .map(|(hits, attempts)| {
                                debug!(query = %query.text, attempts, hits = hits.len(), "query finished");
                                hits
                            })
                            .map_err(|(error, _)| error)
                    }
                    Err(_) => Err(ServiceError::unknown("search worker pool closed")),
                };

                QueryRun {
                    index,
                    keyword_id,
                    query: query.text,
                    result,
                }
            });
        }

        let mut runs = Vec::with_capacity(keywords.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(run) => {
                    if let Err(ref error) = run.result {
                        if error.kind.is_fatal() {
                            set.abort_all();
                            return Err(error.clone());
                        }
                    }
                    runs.push(run);
                }
                Err(join_error) => {
                    set.abort_all();
                    return Err(ServiceError::unknown(format!(
                        "search worker failed: {}",
                        join_error
                    )));
                }
            }
        }

        runs.sort_by_key(|run| run.index);
        Ok(runs)
    }

    /// Fold finished runs into outcomes and coverage.
    ///
    /// Fails with the first failure (in keyword order) when no query
    /// succeeded.
    fn collect(runs: Vec<QueryRun>) -> Result<(Vec<QueryOutcome>, Coverage), ServiceError> {
        let attempted = runs.len();
        let mut outcomes = Vec::with_capacity(attempted);
        let mut failed = Vec::new();
        let mut first_error = None;

        for run in runs {
            match run.result {
                Ok(hits) => outcomes.push(QueryOutcome {
                    keyword_id: run.keyword_id,
                    hits,
                }),
                Err(error) => {
                    failed.push(FailedQuery {
                        keyword_id: run.keyword_id,
                        query: run.query,
                        kind: error.kind,
                        message: error.message.clone(),
                    });
                    first_error.get_or_insert(error);
                }
            }
        }

        if outcomes.is_empty() {
            let error = first_error.unwrap_or_else(|| ServiceError::unknown("no search queries ran"));
            return Err(ServiceError::new(
                error.kind,
                format!("all {} search queries failed; first: {}", attempted, error.message),
            ));
        }

        let coverage = Coverage {
            attempted,
            succeeded: outcomes.len(),
            failed,
        };
        Ok((outcomes, coverage))
    }

    /// Search for every keyword, then merge and cluster the hits
    async fn gather(
        &self,
        searched: &[KeywordEntry],
        locale: Option<&str>,
        budget: Budget,
    ) -> Result<SearchFindings, ServiceError> {
        info!(
            queries = searched.len(),
            workers = self.worker_count,
            search = self.search.name(),
            "starting search fan-out"
        );

        let runs = self.fan_out(searched, locale, budget).await?;
        let (outcomes, coverage) = Self::collect(runs)?;

        if !coverage.failed.is_empty() {
            warn!(
                succeeded = coverage.succeeded,
                attempted = coverage.attempted,
                failed = ?coverage.failed.iter().map(|f| f.keyword_id.as_str()).collect::<Vec<_>>(),
                "partial search coverage"
            );
        }

        let items = merge_hits(&outcomes);
        let clusters = cluster_items(&items, DEFAULT_SIMILARITY_THRESHOLD);
        debug!(items = items.len(), clusters = clusters.len(), "merged search results");

        Ok(SearchFindings {
            items,
            clusters,
            coverage,
        })
    }

    fn request(
        input: &SearchInput,
        searched: &[KeywordEntry],
        findings: &SearchFindings,
        feedback: Option<&str>,
    ) -> CompletionRequest {
        let keywords: Vec<Value> = searched
            .iter()
            .map(|k| json!({"id": k.id, "keyword": k.keyword, "score": k.score}))
            .collect();
        let items: Vec<Value> = findings
            .items
            .iter()
            .map(|i| {
                json!({
                    "id": i.id,
                    "title": i.title,
                    "url": i.url,
                    "snippet": i.snippet,
                    "keyword_ids": i.keyword_ids,
                })
            })
            .collect();
        let clusters: Vec<Value> = findings
            .clusters
            .iter()
            .map(|c| json!({"cluster_id": c.id, "item_ids": c.item_ids}))
            .collect();
        let failed: Vec<&str> = findings
            .coverage
            .failed
            .iter()
            .map(|f| f.keyword_id.as_str())
            .collect();

        let context = json!({
            "topic": input.topic.as_ref(),
            "keywords": keywords,
            "results": items,
            "clusters": clusters,
            "keywords_without_results": failed,
        });

        CompletionRequest::new(
            RoleName::SearchAnalyst,
            INSTRUCTIONS,
            context,
            shape_hint::<SearchSynthesisDraft>(),
        )
        .with_feedback(feedback)
    }
}

#[async_trait]
impl AgentRole for SearchAnalyst {
    type Input = SearchInput;
    type Draft = SearchDraft;
    type Output = SearchAnalysisResult;

    const ROLE: RoleName = RoleName::SearchAnalyst;

    async fn attempt(&self, input: &SearchInput, env: &RoleEnv<'_>) -> Result<SearchDraft, ServiceError> {
        let searched = input.keywords.top(self.top_k);
        if searched.is_empty() {
            return Err(ServiceError::unknown("no keywords to search for"));
        }

        let mut cached = self.findings.lock().await;
        let findings = match cached.clone() {
            Some(findings) => {
                debug!(items = findings.items.len(), "reusing search findings");
                findings
            }
            None => {
                let findings = self
                    .gather(searched, input.topic.locale(), env.budget)
                    .await?;
                *cached = Some(findings.clone());
                findings
            }
        };
        drop(cached);

        let request = Self::request(input, searched, &findings, env.feedback);
        let synthesis = env
            .budget
            .deadline
            .run("search synthesis completion", self.llm.complete(&request))
            .await?;

        Ok(SearchDraft {
            findings,
            synthesis,
        })
    }

    fn validate(
        &self,
        validator: &SchemaValidator,
        input: &SearchInput,
        draft: SearchDraft,
    ) -> Result<SearchAnalysisResult, ValidationFailure> {
        validator.validate_search_analysis(&draft.synthesis, &input.keywords, draft.findings)
    }
}
