use crate::llm::client::{CompletionRequest, LlmClient};
use crate::llm::extract_json;
use crate::types::ServiceError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAIClient {
    /// # Errors
    ///
    /// `Auth` when the API key is empty, `Unknown` if the HTTP client
    /// cannot be built.
    pub fn new(
        api_key: &str,
        api_base: &str,
        model: &str,
        temperature: f32,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::auth("OpenAI API key is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.system_prompt() },
                { "role": "user", "content": request.user_prompt() }
            ]
        });

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::malformed(format!("OpenAI response body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::malformed("No content in OpenAI response"))?;

        extract_json(&content).ok_or_else(|| {
            ServiceError::malformed(format!(
                "OpenAI content is not a JSON object: {}",
                content.chars().take(200).collect::<String>()
            ))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
