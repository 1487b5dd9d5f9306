//! Integration tests for the reqwest-backed fetcher

use std::time::Duration;

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linkvault_core::domain::RequestSnapshot;
use linkvault_core::ports::IHttpFetcher;
use linkvault_sync::client::{HttpFetcher, DEFAULT_TIMEOUT};

use crate::common;

#[tokio::test]
async fn test_fetch_sends_method_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(common::METADATA_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "id": "B1",
            "url": "https://b1.example.com/"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "abc")
                .set_body_string(r#"{"bookmarkId":"B1"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
    let response = fetcher.fetch(&common::metadata_request("B1")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("X-Request-Id"), Some("abc"));
    assert_eq!(response.body(), br#"{"bookmarkId":"B1"}"#);
}

#[tokio::test]
async fn test_fetch_forwards_binary_body_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/favicons/b1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let bytes = vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0x00];
    let request = RequestSnapshot::new("PUT", "/api/favicons/b1")
        .with_header("Content-Type", "image/png")
        .with_body(bytes.clone());

    let fetcher = HttpFetcher::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
    let response = fetcher.fetch(&request).await.unwrap();
    assert_eq!(response.status(), 204);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, bytes);
}

#[tokio::test]
async fn test_fetch_preserves_retry_after_on_429() {
    let server = MockServer::start().await;
    common::mount_metadata(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;

    let fetcher = HttpFetcher::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
    let response = fetcher.fetch(&common::metadata_request("B1")).await.unwrap();

    assert_eq!(response.status(), 429);
    assert_eq!(response.header("retry-after"), Some("30"));
}

#[tokio::test]
async fn test_error_status_is_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
    let response = fetcher.fetch(&RequestSnapshot::get("/missing")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    common::mount_metadata(
        &server,
        ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
    )
    .await;

    let fetcher = HttpFetcher::new(&server.uri(), Duration::from_millis(50)).unwrap();
    assert!(fetcher.fetch(&common::metadata_request("B1")).await.is_err());
}

#[tokio::test]
async fn test_unreachable_origin_is_error() {
    let fetcher = HttpFetcher::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    assert!(fetcher.fetch(&RequestSnapshot::get("/")).await.is_err());
}
