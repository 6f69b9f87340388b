//! Search adapter using daedra
//!
//! daedra uses DuckDuckGo as the search backend, so no API key is needed.

use crate::search::client::SearchClient;
use crate::types::{SearchHit, SearchQuery, ServiceError};
use async_trait::async_trait;

/// Web search client powered by daedra
pub struct DuckDuckGoClient;

impl DuckDuckGoClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DuckDuckGoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// DuckDuckGo's region code for a locale: "en-US" -> "us-en"
fn region(locale: &str) -> Option<String> {
    let mut parts = locale.split(['-', '_']);
    let lang = parts.next().filter(|p| !p.is_empty())?;
    let country = parts.next().filter(|p| !p.is_empty())?;
    Some(format!("{}-{}", country.to_lowercase(), lang.to_lowercase()))
}

fn search_args(query: &SearchQuery) -> daedra::SearchArgs {
    let mut options = daedra::SearchOptions {
        num_results: query.limit,
        ..Default::default()
    };
    if let Some(region) = query.locale.as_deref().and_then(region) {
        options.region = region;
    }

    daedra::SearchArgs {
        query: query.text.clone(),
        options: Some(options),
    }
}

/// daedra reports failures as display strings only
fn classify(message: String) -> ServiceError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        ServiceError::rate_limit(message)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ServiceError::timeout(message)
    } else if lower.contains("parse") || lower.contains("decode") {
        ServiceError::malformed(message)
    } else {
        ServiceError::unknown(message)
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ServiceError> {
        let search_args = search_args(query);

        match daedra::tools::search::perform_search(&search_args).await {
            Ok(response) => Ok(response
                .data
                .iter()
                .take(query.limit)
                .enumerate()
                .map(|(i, r)| SearchHit {
                    title: r.title.clone(),
                    url: r.url.clone(),
                    snippet: r.description.clone(),
                    position: i as u32 + 1,
                })
                .collect()),
            Err(e) => Err(classify(format!("Search failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    fn query(locale: Option<&str>) -> SearchQuery {
        SearchQuery {
            text: "rust async".to_string(),
            locale: locale.map(str::to_string),
            limit: 5,
        }
    }

    #[test]
    fn test_search_args_maps_locale() {
        let args = search_args(&query(Some("en-US")));
        let options = args.options.unwrap();
        assert_eq!(args.query, "rust async");
        assert_eq!(options.num_results, 5);
        assert_eq!(options.region, "us-en");

        let options = search_args(&query(Some("de_DE"))).options.unwrap();
        assert_eq!(options.region, "de-de");
    }

    #[test]
    fn test_search_args_without_region_uses_default() {
        let default_region = daedra::SearchOptions::default().region;

        for locale in [None, Some("en"), Some("")] {
            let options = search_args(&query(locale)).options.unwrap();
            assert_eq!(options.region, default_region, "locale {:?}", locale);
            assert_eq!(options.num_results, 5);
        }
    }

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            classify("HTTP 429 Too Many Requests".to_string()).kind,
            FailureKind::RateLimit
        );
        assert_eq!(
            classify("operation timed out".to_string()).kind,
            FailureKind::Timeout
        );
        assert_eq!(
            classify("failed to parse results page".to_string()).kind,
            FailureKind::Malformed
        );
        assert_eq!(
            classify("connection reset".to_string()).kind,
            FailureKind::Unknown
        );
    }
}
