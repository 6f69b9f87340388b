//! Serper adapter tests against a mocked HTTP server

#![cfg(feature = "serper")]

use quarry::search::SearchProvider;
use quarry::types::{FailureKind, SearchQuery};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn serper(server: &MockServer) -> SearchProvider {
    SearchProvider::Serper {
        api_key: "serper-test".to_string(),
        endpoint: format!("{}/search", server.uri()),
        request_timeout: Duration::from_secs(5),
    }
}

fn query(limit: usize) -> SearchQuery {
    SearchQuery {
        text: "ai agents".to_string(),
        locale: Some("en-US".to_string()),
        limit,
    }
}

#[tokio::test]
async fn test_serper_maps_organic_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("x-api-key", "serper-test"))
        .and(body_partial_json(json!({"q": "ai agents", "hl": "en", "gl": "us"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchParameters": {"q": "ai agents"},
            "organic": [
                {"title": "What are AI agents?", "link": "https://example.com/agents", "snippet": "An intro", "position": 1},
                {"title": "Agent frameworks", "link": "https://example.org/frameworks", "position": 2},
                {"title": "Third", "link": "https://example.net/3", "snippet": "", "position": 3}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = serper(&server).create_client().unwrap();
    let hits = client.search(&query(2)).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://example.com/agents");
    assert_eq!(hits[0].position, 1);
    assert_eq!(hits[1].snippet, "");
}

#[tokio::test]
async fn test_serper_without_organic_results_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"searchParameters": {}})))
        .mount(&server)
        .await;

    let client = serper(&server).create_client().unwrap();
    let hits = client.search(&query(10)).await.unwrap();

    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_serper_status_classification() {
    for (status, expected) in [
        (401, FailureKind::Auth),
        (429, FailureKind::RateLimit),
        (502, FailureKind::Unknown),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = serper(&server).create_client().unwrap();
        let err = client.search(&query(10)).await.unwrap_err();
        assert_eq!(err.kind, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_serper_garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;

    let client = serper(&server).create_client().unwrap();
    let err = client.search(&query(10)).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Malformed);
}

#[test]
fn test_serper_requires_api_key() {
    let provider = SearchProvider::Serper {
        api_key: String::new(),
        endpoint: "https://google.serper.dev/search".to_string(),
        request_timeout: Duration::from_secs(5),
    };

    let err = provider.create_client().err().unwrap();
    assert_eq!(err.kind, FailureKind::Auth);
}
