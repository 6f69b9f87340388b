//! Insights compiler: turns keyword and search analysis into a prioritized
//! strategy

use super::{AgentRole, RoleEnv};
use crate::llm::{CompletionRequest, LlmClient};
use crate::research::context::InsightsInput;
use crate::schema::{shape_hint, RecommendationDraft, SchemaValidator};
use crate::types::{RecommendationReport, RoleName, ServiceError, ValidationFailure};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const INSTRUCTIONS: &str = r#"Compile final keyword recommendations and a search strategy.

1. Synthesize the findings of the keyword research and the search analysis.
2. Create a prioritized list of recommended search terms (priority 1 first).
3. Group related terms and phrases.
4. Provide specific recommendations for different search objectives.
5. Back every claim with evidence: cite keyword ids (kw-N) and result or cluster ids (src-N, cl-N).

Use only ids that appear in the input."#;

pub struct InsightsCompiler {
    llm: Arc<dyn LlmClient>,
}

impl InsightsCompiler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn request(input: &InsightsInput, feedback: Option<&str>) -> CompletionRequest {
        let analysis = &input.analysis;
        let results: Vec<Value> = analysis
            .ranking
            .iter()
            .filter_map(|id| analysis.item(id))
            .map(|i| json!({"id": i.id, "title": i.title, "url": i.url, "keyword_ids": i.keyword_ids}))
            .collect();

        let context = json!({
            "topic": input.topic.as_ref(),
            "keyword_analysis": input.keywords.as_ref(),
            "search_analysis": {
                "results_by_relevance": results,
                "clusters": analysis.clusters,
                "gaps": analysis.gaps,
                "refinements": analysis.refinements,
                "coverage": {
                    "attempted": analysis.coverage.attempted,
                    "succeeded": analysis.coverage.succeeded,
                },
            },
        });

        CompletionRequest::new(
            RoleName::InsightsCompiler,
            INSTRUCTIONS,
            context,
            shape_hint::<RecommendationDraft>(),
        )
        .with_feedback(feedback)
    }
}

#[async_trait]
impl AgentRole for InsightsCompiler {
    type Input = InsightsInput;
    type Draft = Value;
    type Output = RecommendationReport;

    const ROLE: RoleName = RoleName::InsightsCompiler;

    async fn attempt(&self, input: &InsightsInput, env: &RoleEnv<'_>) -> Result<Value, ServiceError> {
        let request = Self::request(input, env.feedback);
        debug!(model = self.llm.model_name(), attempt = env.attempt, "requesting recommendations");
        env.budget
            .deadline
            .run("recommendation completion", self.llm.complete(&request))
            .await
    }

    fn validate(
        &self,
        validator: &SchemaValidator,
        input: &InsightsInput,
        draft: Value,
    ) -> Result<RecommendationReport, ValidationFailure> {
        validator.validate_recommendations(&draft, &input.keywords, &input.analysis)
    }
}
