//! Pipeline roles
//!
//! The three roles are fixed, each with a typed input and output:
//!
//! | Role | Input | Output |
//! |------|-------|--------|
//! | [`KeywordSpecialist`] | topic | [`KeywordResult`](crate::types::KeywordResult) |
//! | [`SearchAnalyst`] | topic, keywords | [`SearchAnalysisResult`](crate::types::SearchAnalysisResult) |
//! | [`InsightsCompiler`] | topic, keywords, analysis | [`RecommendationReport`](crate::types::RecommendationReport) |
//!
//! A role performs one attempt at a time and never retries on its own
//! account. The orchestrator decides whether a failed attempt is repeated
//! and feeds validation diagnostics back through [`RoleEnv`].

pub mod insights;
pub mod keyword;
pub mod search_analyst;

pub use insights::InsightsCompiler;
pub use keyword::KeywordSpecialist;
pub use search_analyst::SearchAnalyst;

use crate::research::retry::Budget;
use crate::schema::SchemaValidator;
use crate::types::{RoleName, ServiceError, ValidationFailure};
use async_trait::async_trait;

/// What the orchestrator lends a role for one attempt
#[derive(Debug, Clone, Copy)]
pub struct RoleEnv<'a> {
    /// Shared retry policy and run deadline
    pub budget: Budget,
    /// 1-based attempt number
    pub attempt: u32,
    /// Diagnostic from the previous rejected attempt
    pub feedback: Option<&'a str>,
}

/// One stage of the research pipeline
#[async_trait]
pub trait AgentRole: Send + Sync {
    /// Slice of the run context this role reads
    type Input: Send + Sync;
    /// Unvalidated product of one attempt
    type Draft: Send;
    /// Validated output stored in the run context
    type Output: Send;

    const ROLE: RoleName;

    /// Perform one attempt. Every external call must go through
    /// `env.budget` so it is bounded by the run deadline.
    async fn attempt(
        &self,
        input: &Self::Input,
        env: &RoleEnv<'_>,
    ) -> Result<Self::Draft, ServiceError>;

    /// Check a draft against this role's schema and the input it was
    /// produced from.
    fn validate(
        &self,
        validator: &SchemaValidator,
        input: &Self::Input,
        draft: Self::Draft,
    ) -> Result<Self::Output, ValidationFailure>;
}
