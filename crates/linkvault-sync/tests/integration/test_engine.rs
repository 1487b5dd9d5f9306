//! End-to-end drain cycles against a mock origin and SQLite adapters

use std::time::Duration;

use wiremock::ResponseTemplate;

use linkvault_core::domain::{
    BookmarkId, BookmarkMetadataState, Domain, QueuedRequest, RATE_LIMITED_REASON,
    RETRIES_EXHAUSTED_REASON,
};
use linkvault_core::ports::IRequestQueue;
use linkvault_sync::engine::DrainReport;
use linkvault_sync::SyncError;

use crate::common;

fn id(value: &str) -> BookmarkId {
    BookmarkId::new(value).unwrap()
}

#[tokio::test]
async fn test_drain_stores_metadata_and_favicon() {
    let setup = common::setup_engine().await;
    common::mount_metadata(
        &setup.server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "bookmarkId": "B1",
            "title": "Rust",
            "description": "A language empowering everyone",
            "faviconBase64": "data:image/png;base64,iVBORw0KGgo="
        })),
    )
    .await;

    setup.engine.enqueue(common::metadata_request("B1")).await.unwrap();
    let report = setup.engine.drain().await.unwrap();

    assert_eq!(
        report,
        DrainReport {
            delivered: 1,
            dropped: 0,
            requeued: 0
        }
    );
    assert!(setup.queue.is_empty().await.unwrap());

    let state = setup.sink.metadata_state(&id("B1")).await.unwrap().unwrap();
    let metadata = state.metadata().expect("expected success state");
    assert_eq!(
        metadata.description.as_deref(),
        Some("A language empowering everyone")
    );
    assert_eq!(
        setup.sink.bookmark_title(&id("B1")).await.unwrap().as_deref(),
        Some("Rust")
    );

    let favicon = setup
        .sink
        .get_favicon(&Domain::new("b1.example.com").unwrap())
        .await
        .unwrap()
        .expect("favicon should be stored");
    assert!(!favicon.failed);
    assert_eq!(
        favicon.data.as_deref(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
}

#[tokio::test]
async fn test_rate_limit_keeps_entry_at_front() {
    let setup = common::setup_engine().await;
    common::mount_metadata(
        &setup.server,
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;

    setup.engine.enqueue(common::metadata_request("B1")).await.unwrap();
    setup.engine.enqueue(common::metadata_request("B2")).await.unwrap();

    let err = setup.engine.drain().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::RateLimited { retry_after } if retry_after == Duration::from_secs(30)
    ));

    assert_eq!(setup.queue.count().await.unwrap(), 2);
    let front = setup.queue.shift().await.unwrap().unwrap();
    assert_eq!(front.bookmark_id(), Some(id("B1")));

    let state = setup.sink.metadata_state(&id("B1")).await.unwrap().unwrap();
    assert_eq!(state.error_reason(), Some(RATE_LIMITED_REASON));
    assert!(setup.sink.metadata_state(&id("B2")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_persistent_failure_drops_entry() {
    let setup = common::setup_engine().await;
    common::mount_metadata(&setup.server, ResponseTemplate::new(500)).await;

    setup
        .queue
        .push(&QueuedRequest::new(common::metadata_request("B1")))
        .await
        .unwrap();
    let report = setup.engine.drain().await.unwrap();

    assert_eq!(
        report,
        DrainReport {
            delivered: 0,
            dropped: 1,
            requeued: 4
        }
    );
    assert!(setup.queue.is_empty().await.unwrap());
    assert_eq!(setup.server.received_requests().await.unwrap().len(), 5);

    let state = setup.sink.metadata_state(&id("B1")).await.unwrap().unwrap();
    assert!(matches!(state, BookmarkMetadataState::Error { .. }));
    assert_eq!(state.error_reason(), Some(RETRIES_EXHAUSTED_REASON));
}
