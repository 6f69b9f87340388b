use crate::llm::client::{CompletionRequest, LlmClient};
use crate::llm::extract_json;
use crate::types::ServiceError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for a local Ollama server's `/api/chat` endpoint
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f32,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "format": "json",
            "messages": [
                { "role": "system", "content": request.system_prompt() },
                { "role": "user", "content": request.user_prompt() }
            ],
            "options": {
                "temperature": self.temperature
            }
        });

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), &text));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::malformed(format!("Ollama response body: {}", e)))?;

        extract_json(&parsed.message.content).ok_or_else(|| {
            ServiceError::malformed(format!(
                "Ollama content is not a JSON object: {}",
                parsed.message.content.chars().take(200).collect::<String>()
            ))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
