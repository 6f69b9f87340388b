//! Search client abstraction and provider selection

use crate::types::{SearchHit, SearchQuery, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A web search backend.
///
/// One query, one classified outcome; implementations never retry.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a single query and return hits in the service's order.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ServiceError>;

    /// Backend name, for logs
    fn name(&self) -> &str {
        "search"
    }
}

/// Search provider selection
#[derive(Debug, Clone)]
pub enum SearchProvider {
    /// Google results through google.serper.dev
    Serper {
        api_key: String,
        endpoint: String,
        request_timeout: Duration,
    },
    /// DuckDuckGo through the daedra crate; no key required
    DuckDuckGo,
}

impl SearchProvider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// `Auth` when the provider is misconfigured or was not compiled in.
    pub fn create_client(&self) -> Result<Arc<dyn SearchClient>, ServiceError> {
        match self {
            SearchProvider::Serper {
                api_key,
                endpoint,
                request_timeout,
            } => serper_client(api_key, endpoint, *request_timeout),
            SearchProvider::DuckDuckGo => duckduckgo_client(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchProvider::Serper { .. } => "Serper",
            SearchProvider::DuckDuckGo => "DuckDuckGo",
        }
    }
}

#[cfg(feature = "serper")]
fn serper_client(
    api_key: &str,
    endpoint: &str,
    request_timeout: Duration,
) -> Result<Arc<dyn SearchClient>, ServiceError> {
    Ok(Arc::new(super::serper::SerperClient::new(
        api_key,
        endpoint,
        request_timeout,
    )?))
}

#[cfg(not(feature = "serper"))]
fn serper_client(
    _api_key: &str,
    _endpoint: &str,
    _request_timeout: Duration,
) -> Result<Arc<dyn SearchClient>, ServiceError> {
    Err(ServiceError::auth(
        "Serper provider requested but quarry was built without the `serper` feature",
    ))
}

#[cfg(feature = "duckduckgo")]
fn duckduckgo_client() -> Result<Arc<dyn SearchClient>, ServiceError> {
    Ok(Arc::new(super::duckduckgo::DuckDuckGoClient::new()))
}

#[cfg(not(feature = "duckduckgo"))]
fn duckduckgo_client() -> Result<Arc<dyn SearchClient>, ServiceError> {
    Err(ServiceError::auth(
        "DuckDuckGo provider requested but quarry was built without the `duckduckgo` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(SearchProvider::DuckDuckGo.name(), "DuckDuckGo");
        let serper = SearchProvider::Serper {
            api_key: "k".to_string(),
            endpoint: "https://google.serper.dev/search".to_string(),
            request_timeout: Duration::from_secs(10),
        };
        assert_eq!(serper.name(), "Serper");
    }

    #[cfg(feature = "serper")]
    #[test]
    fn test_serper_without_key_is_auth_failure() {
        let provider = SearchProvider::Serper {
            api_key: " ".to_string(),
            endpoint: "https://google.serper.dev/search".to_string(),
            request_timeout: Duration::from_secs(10),
        };
        let err = match provider.create_client() {
            Ok(_) => panic!("Expected error"),
            Err(e) => e,
        };
        assert_eq!(err.kind, crate::types::FailureKind::Auth);
    }
}
