//! Serper (google.serper.dev) search adapter

use crate::search::client::SearchClient;
use crate::types::{SearchHit, SearchQuery, ServiceError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct SerperClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
    position: Option<u32>,
}

impl SerperClient {
    pub fn new(api_key: &str, endpoint: &str, request_timeout: Duration) -> Result<Self, ServiceError> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::auth("Serper API key is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        })
    }

    fn request_body(query: &SearchQuery) -> Value {
        let mut body = json!({
            "q": query.text,
            "num": query.limit,
        });

        // "en-US" -> hl=en, gl=us
        if let Some(ref locale) = query.locale {
            let mut parts = locale.split(['-', '_']);
            if let Some(lang) = parts.next().filter(|p| !p.is_empty()) {
                body["hl"] = json!(lang.to_lowercase());
            }
            if let Some(region) = parts.next().filter(|p| !p.is_empty()) {
                body["gl"] = json!(region.to_lowercase());
            }
        }

        body
    }
}

#[async_trait]
impl SearchClient for SerperClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ServiceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&Self::request_body(query))
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), &text));
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::malformed(format!("Serper response body: {}", e)))?;

        Ok(parsed
            .organic
            .into_iter()
            .take(query.limit)
            .enumerate()
            .map(|(i, r)| SearchHit {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
                position: r.position.unwrap_or(i as u32 + 1),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "serper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_maps_locale() {
        let body = SerperClient::request_body(&SearchQuery {
            text: "rust async".to_string(),
            locale: Some("en-GB".to_string()),
            limit: 5,
        });
        assert_eq!(body["q"], "rust async");
        assert_eq!(body["num"], 5);
        assert_eq!(body["hl"], "en");
        assert_eq!(body["gl"], "gb");
    }

    #[test]
    fn test_request_body_without_locale() {
        let body = SerperClient::request_body(&SearchQuery {
            text: "rust".to_string(),
            locale: None,
            limit: 10,
        });
        assert!(body.get("hl").is_none());
        assert!(body.get("gl").is_none());
    }
}
