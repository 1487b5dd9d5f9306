//! Integration tests for SqliteRequestQueue
//!
//! Each test creates a fresh in-memory database to ensure isolation.

use chrono::{Duration, Utc};

use linkvault_cache::{DatabasePool, SqliteRequestQueue};
use linkvault_core::domain::{MetadataRequest, QueuedRequest, RequestSnapshot};
use linkvault_core::ports::IRequestQueue;

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> SqliteRequestQueue {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteRequestQueue::new(pool.pool().clone())
}

fn entry(id: &str) -> QueuedRequest {
    let request = RequestSnapshot::post_json(
        "http://127.0.0.1:5173/api/fetch-metadata",
        &MetadataRequest::new(id, format!("https://example.com/{id}")),
    )
    .unwrap();
    QueuedRequest::new(request)
}

fn id_of(entry: &QueuedRequest) -> String {
    entry.bookmark_id().unwrap().to_string()
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_empty_queue() {
    let queue = setup().await;
    assert!(queue.is_empty().await.unwrap());
    assert!(queue.shift().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fifo_without_unshift() {
    let queue = setup().await;
    for id in ["a", "b", "c"] {
        queue.push(&entry(id)).await.unwrap();
    }
    assert_eq!(queue.len().await.unwrap(), 3);

    let order: Vec<String> = [
        queue.shift().await.unwrap().unwrap(),
        queue.shift().await.unwrap().unwrap(),
        queue.shift().await.unwrap().unwrap(),
    ]
    .iter()
    .map(id_of)
    .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert!(queue.shift().await.unwrap().is_none());
}

#[tokio::test]
async fn test_unshift_returns_same_entry_byte_identical() {
    let queue = setup().await;
    queue.push(&entry("a")).await.unwrap();
    queue.push(&entry("b")).await.unwrap();
    let original_payloads = queue.payloads().await.unwrap();

    let first = queue.shift().await.unwrap().unwrap();
    queue.unshift(&first).await.unwrap();

    assert_eq!(queue.payloads().await.unwrap(), original_payloads);

    let again = queue.shift().await.unwrap().unwrap();
    assert_eq!(again.to_json().unwrap(), original_payloads[0]);
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_push_back_after_failure_moves_to_end() {
    let queue = setup().await;
    queue.push(&entry("a")).await.unwrap();
    queue.push(&entry("b")).await.unwrap();

    let first = queue.shift().await.unwrap().unwrap();
    queue.push(&first).await.unwrap();

    assert_eq!(id_of(&queue.shift().await.unwrap().unwrap()), "b");
    assert_eq!(id_of(&queue.shift().await.unwrap().unwrap()), "a");
}

#[tokio::test]
async fn test_unshift_into_empty_queue() {
    let queue = setup().await;
    queue.unshift(&entry("x")).await.unwrap();
    queue.push(&entry("y")).await.unwrap();
    assert_eq!(id_of(&queue.shift().await.unwrap().unwrap()), "x");
    assert_eq!(id_of(&queue.shift().await.unwrap().unwrap()), "y");
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn test_expired_entries_are_discarded() {
    let queue = setup().await;
    let now = Utc::now();

    let stale = QueuedRequest::with_timestamp(entry("old").request().clone(), now - Duration::hours(25));
    queue.push(&stale).await.unwrap();
    queue.push(&entry("fresh")).await.unwrap();

    let next = queue.shift().await.unwrap().unwrap();
    assert_eq!(id_of(&next), "fresh");
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_only_expired_entries_yield_none() {
    let queue = setup().await;
    let now = Utc::now();
    let stale = QueuedRequest::with_timestamp(entry("old").request().clone(), now - Duration::hours(48));
    queue.push(&stale).await.unwrap();

    assert!(queue.shift().await.unwrap().is_none());
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_custom_retention() {
    let pool = DatabasePool::in_memory().await.unwrap();
    let queue = SqliteRequestQueue::new(pool.pool().clone()).with_retention(Duration::minutes(5));
    assert_eq!(queue.retention(), Duration::minutes(5));

    let now = Utc::now();
    let entry = QueuedRequest::with_timestamp(entry("a").request().clone(), now - Duration::minutes(10));
    queue.push(&entry).await.unwrap();

    assert!(queue.shift_at(now).await.unwrap().is_none());
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_queue_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("linkvault.db");

    {
        let pool = DatabasePool::new(&db_path).await.unwrap();
        let queue = SqliteRequestQueue::new(pool.pool().clone());
        queue.push(&entry("a")).await.unwrap();
        queue.push(&entry("b")).await.unwrap();
        pool.close().await;
    }

    let pool = DatabasePool::new(&db_path).await.unwrap();
    let queue = SqliteRequestQueue::new(pool.pool().clone());
    assert_eq!(queue.len().await.unwrap(), 2);
    assert_eq!(id_of(&queue.shift().await.unwrap().unwrap()), "a");
}
