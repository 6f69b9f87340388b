use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Error taxonomy shared by adapters, roles and the orchestrator.
pub mod error;

pub use error::{
    AppError, FailureKind, PartialCoverageWarning, PipelineError, Result, ServiceError,
    ValidationFailure,
};

// ============= Role Types =============

/// Identity of one of the three fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    KeywordSpecialist,
    SearchAnalyst,
    InsightsCompiler,
}

impl RoleName {
    /// Roles in the order the orchestrator executes them.
    pub const PIPELINE: [RoleName; 3] = [
        RoleName::KeywordSpecialist,
        RoleName::SearchAnalyst,
        RoleName::InsightsCompiler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::KeywordSpecialist => "keyword_specialist",
            RoleName::SearchAnalyst => "search_analyst",
            RoleName::InsightsCompiler => "insights_compiler",
        }
    }

    /// Human readable job title, used in prompts and terminal output
    pub fn title(&self) -> &'static str {
        match self {
            RoleName::KeywordSpecialist => "Expert Keyword Research Specialist",
            RoleName::SearchAnalyst => "Search Results Analyst",
            RoleName::InsightsCompiler => "Research Insights Compiler",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Topic Types =============

/// Desired depth of research
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Brief,
    Moderate,
    #[default]
    Comprehensive,
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brief" => Ok(Depth::Brief),
            "moderate" => Ok(Depth::Moderate),
            "comprehensive" => Ok(Depth::Comprehensive),
            other => Err(format!(
                "unknown depth '{}' (expected brief, moderate or comprehensive)",
                other
            )),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Depth::Brief => "brief",
            Depth::Moderate => "moderate",
            Depth::Comprehensive => "comprehensive",
        };
        f.write_str(s)
    }
}

/// The subject of a research run plus its optional constraints.
///
/// A `Topic` is validated on construction and never mutated once a run
/// starts; the orchestrator shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    research_objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    specific_focus: Option<String>,
    depth: Depth,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_keywords: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
}

impl Topic {
    /// Create a topic from its free-text subject.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` when the subject is blank.
    pub fn new(subject: impl Into<String>) -> Result<Self> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(AppError::InvalidInput(
                "topic subject must not be empty".to_string(),
            ));
        }

        Ok(Self {
            subject,
            context: None,
            research_objective: None,
            specific_focus: None,
            depth: Depth::default(),
            max_keywords: None,
            locale: None,
        })
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = non_blank(context.into());
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.research_objective = non_blank(objective.into());
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.specific_focus = non_blank(focus.into());
        self
    }

    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    /// Bound the number of keywords the specialist may return.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for a bound of zero.
    pub fn with_max_keywords(mut self, max: usize) -> Result<Self> {
        if max == 0 {
            return Err(AppError::InvalidInput(
                "max keywords must be at least 1".to_string(),
            ));
        }
        self.max_keywords = Some(max);
        Ok(self)
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = non_blank(locale.into());
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn research_objective(&self) -> Option<&str> {
        self.research_objective.as_deref()
    }

    pub fn specific_focus(&self) -> Option<&str> {
        self.specific_focus.as_deref()
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn max_keywords(&self) -> Option<usize> {
        self.max_keywords
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============= Keyword Types =============

/// Search intent a keyword is expected to serve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchIntent {
    #[default]
    Informational,
    Navigational,
    Commercial,
    Transactional,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordEntry {
    pub id: String,
    pub keyword: String,
    /// Relevance in `[0, 1]`
    pub score: f64,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    pub intent: SearchIntent,
}

/// Output of the keyword specialist.
///
/// Entries are unique by [`normalize_keyword`] and ordered by
/// non-increasing score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordResult {
    pub concepts: Vec<String>,
    pub entries: Vec<KeywordEntry>,
    pub related_terms: Vec<String>,
}

impl KeywordResult {
    /// The `k` highest-scoring entries
    pub fn top(&self, k: usize) -> &[KeywordEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn get(&self, id: &str) -> Option<&KeywordEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Normalize keyword text for duplicate detection: lowercase, trim
/// surrounding punctuation and collapse inner whitespace.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============= Search Types =============

/// One query sent to a search service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub locale: Option<String>,
    pub limit: usize,
}

/// One raw record returned by a search service, in service order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based position in the service's result list
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResultItem {
    pub id: String,
    pub url: String,
    pub normalized_url: String,
    pub title: String,
    pub snippet: String,
    pub source_rank: u32,
    /// Keywords whose query returned this item
    pub keyword_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub summary: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRefinement {
    pub keyword_id: String,
    pub suggested_query: String,
    pub reason: String,
}

/// A per-keyword query that never succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedQuery {
    pub keyword_id: String,
    pub query: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedQuery>,
}

impl Coverage {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && self.succeeded > 0
    }
}

/// Output of the search analyst
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnalysisResult {
    /// Deduplicated by normalized URL
    pub items: Vec<SearchResultItem>,
    pub clusters: Vec<Cluster>,
    /// Item ids, most relevant first
    pub ranking: Vec<String>,
    pub coverage: Coverage,
    pub gaps: Vec<String>,
    pub refinements: Vec<QueryRefinement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_coverage: Option<PartialCoverageWarning>,
}

impl SearchAnalysisResult {
    pub fn item(&self, id: &str) -> Option<&SearchResultItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.item(id).is_some()
    }
}

// ============= Recommendation Types =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyEntry {
    pub priority: u32,
    pub keyword_id: String,
    pub keyword: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordGroup {
    pub name: String,
    pub keyword_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveRecommendation {
    pub objective: String,
    pub recommendation: String,
    pub keyword_ids: Vec<String>,
}

/// A claim and the ids it rests on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceEntry {
    pub claim: String,
    pub keyword_ids: Vec<String>,
    pub source_ids: Vec<String>,
}

/// Output of the insights compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationReport {
    pub summary: String,
    /// Ordered by ascending priority
    pub strategy: Vec<StrategyEntry>,
    pub groups: Vec<KeywordGroup>,
    pub objectives: Vec<ObjectiveRecommendation>,
    pub evidence: Vec<EvidenceEntry>,
}

// ============= Task Types =============

/// State of one role's task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Summary of a finished task, copied into the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub role: RoleName,
    pub status: TaskStatus,
    pub attempts: u32,
}

// ============= Report =============

/// The complete, schema-valid product of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub topic: Topic,
    pub keyword_analysis: KeywordResult,
    pub search_analysis: SearchAnalysisResult,
    pub recommendations: RecommendationReport,
    pub tasks: Vec<TaskRecord>,
    pub warnings: Vec<PartialCoverageWarning>,
}

impl Report {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn task(&self, role: RoleName) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.role == role)
    }
}
