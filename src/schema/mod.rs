//! Role output validation
//!
//! Every role output passes through [`SchemaValidator`] before it is stored
//! in the run context. Validation checks shape (required fields, types,
//! non-empty text), ordering invariants and, for the insights compiler,
//! that every cited id exists in the upstream results.
//!
//! Two defects are repaired rather than rejected because the repair is
//! unambiguous: duplicate keywords (the highest score wins) and keyword
//! order (stable sort by descending score). Everything else becomes a
//! [`ValidationFailure`] whose diagnostic is sent back to the model.

/// Draft shapes requested from the model.
pub mod shapes;

pub use shapes::{KeywordDraft, RecommendationDraft, SearchSynthesisDraft};

use crate::search::SearchFindings;
use crate::types::{
    normalize_keyword, Cluster, EvidenceEntry, KeywordEntry, KeywordGroup, KeywordResult,
    ObjectiveRecommendation, PartialCoverageWarning, QueryRefinement, RecommendationReport,
    RoleName, SearchAnalysisResult, StrategyEntry, Topic, ValidationFailure,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Issues beyond this many are summarized in the diagnostic
const MAX_REPORTED_ISSUES: usize = 8;

/// JSON Schema of `T`, sent to the model as the expected output shape
pub fn shape_hint<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Collects every problem in a draft so one retry can fix them all
struct Issues {
    role: RoleName,
    found: Vec<String>,
}

impl Issues {
    fn new(role: RoleName) -> Self {
        Self {
            role,
            found: Vec::new(),
        }
    }

    fn push(&mut self, issue: impl Into<String>) {
        self.found.push(issue.into());
    }

    /// Keep the ids that satisfy `exists`, recording the rest
    fn known_ids(
        &mut self,
        path: &str,
        ids: Vec<String>,
        exists: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        let mut kept = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.trim();
            if exists(id) {
                kept.push(id.to_string());
            } else {
                self.push(format!("{}: unknown id '{}'", path, id));
            }
        }
        kept
    }

    fn check(self) -> Result<(), ValidationFailure> {
        if self.found.is_empty() {
            return Ok(());
        }

        let total = self.found.len();
        let mut diagnostic = self
            .found
            .into_iter()
            .take(MAX_REPORTED_ISSUES)
            .collect::<Vec<_>>()
            .join("; ");
        if total > MAX_REPORTED_ISSUES {
            diagnostic.push_str(&format!(" (and {} more)", total - MAX_REPORTED_ISSUES));
        }

        Err(ValidationFailure::new(
            self.role,
            format!("{} problem(s): {}", total, diagnostic),
        ))
    }
}

fn parse<T: DeserializeOwned>(role: RoleName, raw: &Value) -> Result<T, ValidationFailure> {
    if !raw.is_object() {
        return Err(ValidationFailure::new(
            role,
            format!("expected a JSON object, got {}", json_type(raw)),
        ));
    }

    serde_json::from_value(raw.clone()).map_err(|e| {
        ValidationFailure::new(role, format!("response does not match the expected shape: {}", e))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn trimmed(text: &str) -> Option<String> {
    let t = text.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Trim entries, drop blanks and normalized duplicates
fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|v| trimmed(&v))
        .filter(|v| seen.insert(normalize_keyword(v)))
        .collect()
}

/// Validates and canonicalizes role outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate keyword specialist output for `topic`.
    ///
    /// Duplicates (by normalized text) keep their highest-scoring entry,
    /// entries are stably sorted by descending score, truncated to the
    /// topic's keyword bound and assigned ids `kw-1`, `kw-2`, ...
    pub fn validate_keywords(
        &self,
        raw: &Value,
        topic: &Topic,
    ) -> Result<KeywordResult, ValidationFailure> {
        let role = RoleName::KeywordSpecialist;
        let draft: KeywordDraft = parse(role, raw)?;
        let mut issues = Issues::new(role);

        if draft.keywords.is_empty() {
            issues.push("`keywords` must contain at least one entry");
        }

        let mut entries: Vec<KeywordEntry> = Vec::with_capacity(draft.keywords.len());
        let mut index_by_text: HashMap<String, usize> = HashMap::new();

        for (i, entry) in draft.keywords.into_iter().enumerate() {
            let normalized = normalize_keyword(&entry.keyword);
            if normalized.is_empty() {
                issues.push(format!("keywords[{}]: keyword text is empty", i));
                continue;
            }
            let keyword = entry.keyword.trim().to_string();
            if !entry.score.is_finite() || !(0.0..=1.0).contains(&entry.score) {
                issues.push(format!(
                    "keywords[{}] ('{}'): score {} is outside [0, 1]",
                    i, keyword, entry.score
                ));
                continue;
            }
            let Some(rationale) = trimmed(&entry.rationale) else {
                issues.push(format!("keywords[{}] ('{}'): rationale is empty", i, keyword));
                continue;
            };

            let candidate = KeywordEntry {
                id: String::new(),
                keyword,
                score: entry.score,
                rationale,
                concept: entry.concept.as_deref().and_then(trimmed),
                intent: entry.intent,
            };

            match index_by_text.get(&normalized) {
                Some(&idx) => {
                    if candidate.score > entries[idx].score {
                        entries[idx] = candidate;
                    }
                }
                None => {
                    index_by_text.insert(normalized, entries.len());
                    entries.push(candidate);
                }
            }
        }

        issues.check()?;

        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(max) = topic.max_keywords() {
            entries.truncate(max);
        }
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.id = format!("kw-{}", i + 1);
        }

        Ok(KeywordResult {
            concepts: clean_list(draft.concepts),
            entries,
            related_terms: clean_list(draft.related_terms),
        })
    }

    /// Validate the search analyst's synthesis against its own findings.
    ///
    /// Every cluster needs exactly one label and summary. Ranking ids must
    /// name known items at most once; items the model left out are
    /// appended in merge order. Refinements must cite known keyword ids.
    pub fn validate_search_analysis(
        &self,
        raw: &Value,
        keywords: &KeywordResult,
        findings: SearchFindings,
    ) -> Result<SearchAnalysisResult, ValidationFailure> {
        let role = RoleName::SearchAnalyst;
        let draft: SearchSynthesisDraft = parse(role, raw)?;
        let mut issues = Issues::new(role);

        let mut described: HashMap<&str, (String, String)> = HashMap::new();
        for (i, cluster) in draft.clusters.iter().enumerate() {
            let id = cluster.cluster_id.trim();
            if !findings.clusters.iter().any(|c| c.id == id) {
                issues.push(format!("clusters[{}]: unknown cluster id '{}'", i, id));
                continue;
            }
            if described.contains_key(id) {
                issues.push(format!("clusters[{}]: cluster '{}' described twice", i, id));
                continue;
            }
            match (trimmed(&cluster.label), trimmed(&cluster.summary)) {
                (Some(label), Some(summary)) => {
                    described.insert(id, (label, summary));
                }
                _ => issues.push(format!(
                    "clusters[{}]: cluster '{}' needs a non-empty label and summary",
                    i, id
                )),
            }
        }

        let mut clusters = Vec::with_capacity(findings.clusters.len());
        for cluster in &findings.clusters {
            match described.remove(cluster.id.as_str()) {
                Some((label, summary)) => clusters.push(Cluster {
                    id: cluster.id.clone(),
                    label,
                    summary,
                    item_ids: cluster.item_ids.clone(),
                }),
                None => issues.push(format!("cluster '{}' is missing a label and summary", cluster.id)),
            }
        }

        let mut ranking = Vec::with_capacity(findings.items.len());
        let mut ranked: HashSet<String> = HashSet::new();
        for (i, id) in draft.ranking.iter().enumerate() {
            let id = id.trim();
            if !findings.items.iter().any(|item| item.id == id) {
                issues.push(format!("ranking[{}]: unknown item id '{}'", i, id));
                continue;
            }
            if !ranked.insert(id.to_string()) {
                issues.push(format!("ranking[{}]: item '{}' is ranked more than once", i, id));
                continue;
            }
            ranking.push(id.to_string());
        }
        for item in &findings.items {
            if !ranked.contains(&item.id) {
                ranking.push(item.id.clone());
            }
        }

        let mut refinements = Vec::with_capacity(draft.refinements.len());
        for (i, refinement) in draft.refinements.iter().enumerate() {
            let keyword_id = refinement.keyword_id.trim();
            if !keywords.contains_id(keyword_id) {
                issues.push(format!("refinements[{}]: unknown keyword id '{}'", i, keyword_id));
                continue;
            }
            let Some(suggested_query) = trimmed(&refinement.suggested_query) else {
                issues.push(format!("refinements[{}]: suggested_query is empty", i));
                continue;
            };
            refinements.push(QueryRefinement {
                keyword_id: keyword_id.to_string(),
                suggested_query,
                reason: refinement.reason.trim().to_string(),
            });
        }

        issues.check()?;

        let coverage = findings.coverage;
        let partial_coverage = coverage.is_partial().then(|| PartialCoverageWarning {
            role,
            attempted: coverage.attempted,
            succeeded: coverage.succeeded,
            failed_keyword_ids: coverage.failed.iter().map(|f| f.keyword_id.clone()).collect(),
        });

        Ok(SearchAnalysisResult {
            items: findings.items,
            clusters,
            ranking,
            coverage,
            gaps: clean_list(draft.gaps),
            refinements,
            partial_coverage,
        })
    }

    /// Validate the insights compiler's report.
    ///
    /// Every keyword id must exist in `keywords`; every source id must name
    /// an item or cluster in `analysis`. Strategy entries are ordered by
    /// ascending priority.
    pub fn validate_recommendations(
        &self,
        raw: &Value,
        keywords: &KeywordResult,
        analysis: &SearchAnalysisResult,
    ) -> Result<RecommendationReport, ValidationFailure> {
        let role = RoleName::InsightsCompiler;
        let draft: RecommendationDraft = parse(role, raw)?;
        let mut issues = Issues::new(role);

        let keyword_exists = |id: &str| keywords.contains_id(id);
        let source_exists =
            |id: &str| analysis.contains_item(id) || analysis.clusters.iter().any(|c| c.id == id);

        let summary = trimmed(&draft.summary).unwrap_or_else(|| {
            issues.push("`summary` is empty");
            String::new()
        });

        if draft.strategy.is_empty() {
            issues.push("`strategy` must contain at least one entry");
        }
        let mut strategy = Vec::with_capacity(draft.strategy.len());
        for (i, item) in draft.strategy.into_iter().enumerate() {
            let keyword_id = item.keyword_id.trim();
            let Some(entry) = keywords.get(keyword_id) else {
                issues.push(format!("strategy[{}]: unknown keyword id '{}'", i, keyword_id));
                continue;
            };
            if item.priority == 0 {
                issues.push(format!("strategy[{}]: priority must be 1 or greater", i));
                continue;
            }
            let Some(recommendation) = trimmed(&item.recommendation) else {
                issues.push(format!("strategy[{}]: recommendation is empty", i));
                continue;
            };
            strategy.push(StrategyEntry {
                priority: item.priority,
                keyword_id: entry.id.clone(),
                keyword: entry.keyword.clone(),
                recommendation,
            });
        }
        strategy.sort_by_key(|s| s.priority);

        let mut groups = Vec::with_capacity(draft.groups.len());
        for (i, group) in draft.groups.into_iter().enumerate() {
            let path = format!("groups[{}]", i);
            let Some(name) = trimmed(&group.name) else {
                issues.push(format!("{}: name is empty", path));
                continue;
            };
            if group.keyword_ids.is_empty() {
                issues.push(format!("{} ('{}'): keyword_ids is empty", path, name));
                continue;
            }
            let keyword_ids = issues.known_ids(&path, group.keyword_ids, keyword_exists);
            groups.push(KeywordGroup { name, keyword_ids });
        }

        let mut objectives = Vec::with_capacity(draft.objectives.len());
        for (i, objective) in draft.objectives.into_iter().enumerate() {
            let path = format!("objectives[{}]", i);
            let (Some(name), Some(recommendation)) =
                (trimmed(&objective.objective), trimmed(&objective.recommendation))
            else {
                issues.push(format!("{}: objective and recommendation must be non-empty", path));
                continue;
            };
            let keyword_ids = issues.known_ids(&path, objective.keyword_ids, keyword_exists);
            objectives.push(ObjectiveRecommendation {
                objective: name,
                recommendation,
                keyword_ids,
            });
        }

        if draft.evidence.is_empty() {
            issues.push("`evidence` must contain at least one entry");
        }
        let mut evidence = Vec::with_capacity(draft.evidence.len());
        for (i, item) in draft.evidence.into_iter().enumerate() {
            let path = format!("evidence[{}]", i);
            let Some(claim) = trimmed(&item.claim) else {
                issues.push(format!("{}: claim is empty", path));
                continue;
            };
            if item.keyword_ids.is_empty() && item.source_ids.is_empty() {
                issues.push(format!("{}: claim cites no keyword or source id", path));
                continue;
            }
            let keyword_ids = issues.known_ids(&path, item.keyword_ids, keyword_exists);
            let source_ids = issues.known_ids(&path, item.source_ids, source_exists);
            evidence.push(EvidenceEntry {
                claim,
                keyword_ids,
                source_ids,
            });
        }

        issues.check()?;

        Ok(RecommendationReport {
            summary,
            strategy,
            groups,
            objectives,
            evidence,
        })
    }
}
