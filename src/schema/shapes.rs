//! Output shapes the model is asked to produce
//!
//! These are the raw, unvalidated forms. Their JSON Schema is sent with
//! each request as the shape hint; [`super::SchemaValidator`] turns a
//! parsed draft into the corresponding domain type.

use crate::types::SearchIntent;
use schemars::JsonSchema;
use serde::Deserialize;

/// Keyword specialist output
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KeywordDraft {
    /// Core concepts and sub-topics of the subject
    #[serde(default)]
    pub concepts: Vec<String>,
    /// Candidate search keywords
    pub keywords: Vec<KeywordDraftEntry>,
    /// Related terms and variations worth tracking
    #[serde(default)]
    pub related_terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KeywordDraftEntry {
    pub keyword: String,
    /// Relevance between 0.0 and 1.0
    pub score: f64,
    /// Why this keyword matters for the topic
    pub rationale: String,
    /// Concept from `concepts` this keyword belongs to
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub intent: SearchIntent,
}

/// Search analyst synthesis over already-clustered results
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchSynthesisDraft {
    /// One entry per input cluster
    pub clusters: Vec<ClusterDraft>,
    /// Item ids, most relevant first, each at most once
    pub ranking: Vec<String>,
    /// Topics the results fail to cover
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub refinements: Vec<RefinementDraft>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClusterDraft {
    pub cluster_id: String,
    pub label: String,
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RefinementDraft {
    /// Keyword id whose query should be refined
    pub keyword_id: String,
    pub suggested_query: String,
    #[serde(default)]
    pub reason: String,
}

/// Insights compiler output
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecommendationDraft {
    /// Executive summary
    pub summary: String,
    /// Prioritized keyword strategy, priority 1 first
    pub strategy: Vec<StrategyDraft>,
    #[serde(default)]
    pub groups: Vec<GroupDraft>,
    #[serde(default)]
    pub objectives: Vec<ObjectiveDraft>,
    /// Claims backed by keyword ids and/or search item ids
    pub evidence: Vec<EvidenceDraft>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StrategyDraft {
    pub priority: u32,
    pub keyword_id: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GroupDraft {
    pub name: String,
    pub keyword_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ObjectiveDraft {
    pub objective: String,
    pub recommendation: String,
    #[serde(default)]
    pub keyword_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EvidenceDraft {
    pub claim: String,
    #[serde(default)]
    pub keyword_ids: Vec<String>,
    /// Search item ids (`src-N`) or cluster ids (`cl-N`)
    #[serde(default)]
    pub source_ids: Vec<String>,
}
