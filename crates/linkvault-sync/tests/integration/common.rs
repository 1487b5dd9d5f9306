//! Shared helpers for sync integration tests

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linkvault_cache::{DatabasePool, SqliteDataSink, SqliteRequestQueue};
use linkvault_core::domain::{MetadataRequest, RequestSnapshot};
use linkvault_sync::backoff::BackoffPolicy;
use linkvault_sync::client::{HttpFetcher, DEFAULT_TIMEOUT};
use linkvault_sync::engine::SyncEngine;

pub const METADATA_PATH: &str = "/api/fetch-metadata";

/// A metadata request for bookmark `id` pointing at `https://<id>.example.com/`
pub fn metadata_request(id: &str) -> RequestSnapshot {
    RequestSnapshot::post_json(
        METADATA_PATH,
        &MetadataRequest::new(id, format!("https://{}.example.com/", id.to_lowercase())),
    )
    .unwrap()
}

/// Mounts a metadata endpoint answering with `template`
pub async fn mount_metadata(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(METADATA_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Components of an engine wired to real adapters
pub struct Setup {
    pub server: MockServer,
    pub queue: Arc<SqliteRequestQueue>,
    pub sink: Arc<SqliteDataSink>,
    pub engine: SyncEngine,
}

/// Starts a mock origin and builds an engine with millisecond-scale delays
pub async fn setup_engine() -> Setup {
    let server = MockServer::start().await;
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");

    let queue = Arc::new(SqliteRequestQueue::new(pool.pool().clone()));
    let sink = Arc::new(SqliteDataSink::new(pool.pool().clone()));
    let fetcher =
        Arc::new(HttpFetcher::new(&server.uri(), DEFAULT_TIMEOUT).expect("Invalid mock URI"));

    let engine = SyncEngine::new(queue.clone(), fetcher, sink.clone()).with_backoff(BackoffPolicy {
        min_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        default_rate_limit_delay: Duration::from_millis(60_000),
    });

    Setup {
        server,
        queue,
        sink,
        engine,
    }
}
