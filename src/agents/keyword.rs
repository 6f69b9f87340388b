//! Keyword specialist: breaks a topic into concepts and scored keywords

use super::{AgentRole, RoleEnv};
use crate::llm::{CompletionRequest, LlmClient};
use crate::research::context::KeywordInput;
use crate::schema::{shape_hint, KeywordDraft, SchemaValidator};
use crate::types::{KeywordResult, RoleName, ServiceError, ValidationFailure};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const INSTRUCTIONS: &str = r#"Analyze the topic and identify the most effective search keywords and phrases.

1. Break the topic down into its main concepts.
2. Generate primary keywords for each concept.
3. Identify related terms and synonyms.
4. Consider the different search intents behind each keyword.
5. Propose at least 5 search phrases.

Score each keyword by relevance to the topic and research objective, from 0.0 (irrelevant) to 1.0 (essential), and explain the score in one sentence."#;

pub struct KeywordSpecialist {
    llm: Arc<dyn LlmClient>,
}

impl KeywordSpecialist {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn request(input: &KeywordInput, feedback: Option<&str>) -> CompletionRequest {
        let context = json!({
            "topic": input.topic.as_ref(),
            "max_keywords": input.topic.max_keywords(),
        });

        CompletionRequest::new(
            RoleName::KeywordSpecialist,
            INSTRUCTIONS,
            context,
            shape_hint::<KeywordDraft>(),
        )
        .with_feedback(feedback)
    }
}

#[async_trait]
impl AgentRole for KeywordSpecialist {
    type Input = KeywordInput;
    type Draft = Value;
    type Output = KeywordResult;

    const ROLE: RoleName = RoleName::KeywordSpecialist;

    async fn attempt(&self, input: &KeywordInput, env: &RoleEnv<'_>) -> Result<Value, ServiceError> {
        let request = Self::request(input, env.feedback);
        debug!(model = self.llm.model_name(), attempt = env.attempt, "requesting keywords");
        env.budget
            .deadline
            .run("keyword completion", self.llm.complete(&request))
            .await
    }

    fn validate(
        &self,
        validator: &SchemaValidator,
        input: &KeywordInput,
        draft: Value,
    ) -> Result<KeywordResult, ValidationFailure> {
        validator.validate_keywords(&draft, &input.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Topic;

    #[test]
    fn test_request_carries_topic_and_feedback() {
        let topic = Topic::new("AI agents")
            .unwrap()
            .with_objective("find content gaps")
            .with_max_keywords(8)
            .unwrap();
        let input = KeywordInput {
            topic: Arc::new(topic),
        };

        let request = KeywordSpecialist::request(&input, Some("score 1.5 is outside [0, 1]"));
        assert_eq!(request.role, RoleName::KeywordSpecialist);
        assert_eq!(request.context["topic"]["subject"], "AI agents");
        assert_eq!(request.context["topic"]["research_objective"], "find content gaps");
        assert_eq!(request.context["max_keywords"], 8);
        assert_eq!(request.feedback.as_deref(), Some("score 1.5 is outside [0, 1]"));
        assert!(request.shape_hint.to_string().contains("keywords"));
    }
}
