//! LLM Provider Clients and Abstractions
//!
//! This module hides provider wire formats behind a single call boundary:
//! a [`CompletionRequest`] goes in, a JSON object or a classified
//! [`ServiceError`](crate::types::ServiceError) comes out.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use quarry::llm::{CompletionRequest, LlmProvider};
//!
//! let client = provider.create_client()?;
//! let output = client.complete(&request).await?;
//! ```

/// Core LLM client trait, request type and provider factory.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CompletionRequest, LlmClient, LlmProvider};

use serde_json::Value;

/// Pull a JSON object out of model output.
///
/// Models wrap JSON in markdown fences or surround it with prose often
/// enough that a strict parse alone is not enough. Returns `None` when no
/// JSON object can be recovered.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(fenced) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the info string ("json") up to the end of the line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.rfind("```")?;
    Some(body[..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"a\": [1, 2]}\n```\nAnything else?";
        assert_eq!(extract_json(text), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_extract_embedded_json() {
        let text = "Sure! {\"keywords\": []} Hope that helps.";
        assert_eq!(extract_json(text), Some(json!({"keywords": []})));
    }

    #[test]
    fn test_extract_rejects_non_objects() {
        assert_eq!(extract_json("[1, 2, 3]"), None);
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
