//! LLM client abstraction and provider selection
//!
//! Providers are compiled in through Cargo features:
//! - **OpenAI**: any OpenAI-compatible chat completions endpoint (`openai`)
//! - **Ollama**: a local Ollama server (`ollama`)

use crate::types::{RoleName, ServiceError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
///
/// One call, one classified outcome. Implementations never retry; the
/// orchestrator owns retry, backoff and deadline accounting.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a structured completion request and return the model's JSON
    /// output.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] classified by [`crate::types::FailureKind`].
    /// Content that cannot be parsed as a JSON object is `Malformed`.
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// A role-scoped request for structured output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub role: RoleName,
    /// Role-scoped instructions (the system prompt body)
    pub instructions: String,
    /// The role's input context, serialized
    pub context: Value,
    /// JSON Schema of the expected output
    pub shape_hint: Value,
    /// Diagnostic from the previous rejected attempt, if any
    pub feedback: Option<String>,
}

impl CompletionRequest {
    pub fn new(role: RoleName, instructions: impl Into<String>, context: Value, shape_hint: Value) -> Self {
        Self {
            role,
            instructions: instructions.into(),
            context,
            shape_hint,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: Option<&str>) -> Self {
        self.feedback = feedback.map(str::to_string);
        self
    }

    /// System message: role, instructions and the output contract
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {}.\n\n{}\n\nRespond with a single JSON object and nothing else. \
             It must conform to this JSON Schema:\n{}",
            self.role.title(),
            self.instructions.trim(),
            serde_json::to_string_pretty(&self.shape_hint).unwrap_or_else(|_| self.shape_hint.to_string())
        )
    }

    /// User message: serialized input plus corrective feedback
    pub fn user_prompt(&self) -> String {
        let mut prompt = format!(
            "INPUT:\n{}",
            serde_json::to_string_pretty(&self.context).unwrap_or_else(|_| self.context.to_string())
        );

        if let Some(ref feedback) = self.feedback {
            prompt.push_str(&format!(
                "\n\nYOUR PREVIOUS RESPONSE WAS REJECTED:\n{}\n\
                 Fix the problem and return the complete corrected JSON object.",
                feedback
            ));
        }

        prompt
    }
}

/// Provider enum for runtime selection
///
/// | Provider | Feature | Notes |
/// |----------|---------|-------|
/// | OpenAI | `openai` | Any OpenAI-compatible API (OpenAI, OpenRouter, vLLM) |
/// | Ollama | `ollama` | Local inference, no key needed |
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = LlmProvider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o".to_string(),
    ///     temperature: 0.7,
    ///     request_timeout: Duration::from_secs(120),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
        request_timeout: Duration,
    },

    /// Ollama local LLM provider
    Ollama {
        base_url: String,
        model: String,
        temperature: f32,
        request_timeout: Duration,
    },
}

impl LlmProvider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an `Auth` failure when the provider is misconfigured (no
    /// API key) or was not compiled in.
    pub fn create_client(&self) -> Result<Arc<dyn LlmClient>, ServiceError> {
        match self {
            LlmProvider::OpenAI {
                api_key,
                api_base,
                model,
                temperature,
                request_timeout,
            } => openai_client(api_key, api_base, model, *temperature, *request_timeout),
            LlmProvider::Ollama {
                base_url,
                model,
                temperature,
                request_timeout,
            } => ollama_client(base_url, model, *temperature, *request_timeout),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI { .. } => "OpenAI",
            LlmProvider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::OpenAI { model, .. } | LlmProvider::Ollama { model, .. } => model,
        }
    }
}

#[cfg(feature = "openai")]
fn openai_client(
    api_key: &str,
    api_base: &str,
    model: &str,
    temperature: f32,
    request_timeout: Duration,
) -> Result<Arc<dyn LlmClient>, ServiceError> {
    Ok(Arc::new(super::openai::OpenAIClient::new(
        api_key,
        api_base,
        model,
        temperature,
        request_timeout,
    )?))
}

#[cfg(not(feature = "openai"))]
fn openai_client(
    _api_key: &str,
    _api_base: &str,
    _model: &str,
    _temperature: f32,
    _request_timeout: Duration,
) -> Result<Arc<dyn LlmClient>, ServiceError> {
    Err(ServiceError::auth(
        "OpenAI provider requested but quarry was built without the `openai` feature",
    ))
}

#[cfg(feature = "ollama")]
fn ollama_client(
    base_url: &str,
    model: &str,
    temperature: f32,
    request_timeout: Duration,
) -> Result<Arc<dyn LlmClient>, ServiceError> {
    Ok(Arc::new(super::ollama::OllamaClient::new(
        base_url,
        model,
        temperature,
        request_timeout,
    )?))
}

#[cfg(not(feature = "ollama"))]
fn ollama_client(
    _base_url: &str,
    _model: &str,
    _temperature: f32,
    _request_timeout: Duration,
) -> Result<Arc<dyn LlmClient>, ServiceError> {
    Err(ServiceError::auth(
        "Ollama provider requested but quarry was built without the `ollama` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            RoleName::KeywordSpecialist,
            "Find keywords.",
            json!({"topic": "rust"}),
            json!({"type": "object"}),
        )
    }

    #[test]
    fn test_system_prompt_carries_role_and_schema() {
        let prompt = request().system_prompt();
        assert!(prompt.contains("Expert Keyword Research Specialist"));
        assert!(prompt.contains("Find keywords."));
        assert!(prompt.contains("\"type\": \"object\""));
    }

    #[test]
    fn test_user_prompt_appends_feedback_only_when_present() {
        let plain = request().user_prompt();
        assert!(plain.contains("\"topic\": \"rust\""));
        assert!(!plain.contains("REJECTED"));

        let corrected = request()
            .with_feedback(Some("score out of range"))
            .user_prompt();
        assert!(corrected.contains("REJECTED"));
        assert!(corrected.contains("score out of range"));
    }

    #[test]
    fn test_provider_name_and_model() {
        let provider = LlmProvider::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
        };
        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model(), "llama3.2");
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_openai_without_key_is_auth_failure() {
        let provider = LlmProvider::OpenAI {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
        };

        let err = match provider.create_client() {
            Ok(_) => panic!("Expected error"),
            Err(e) => e,
        };
        assert_eq!(err.kind, crate::types::FailureKind::Auth);
    }
}
