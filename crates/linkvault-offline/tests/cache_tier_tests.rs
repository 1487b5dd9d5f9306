//! Integration tests for the cache tiers over SQLite storage
//!
//! Each test creates a fresh in-memory database to ensure isolation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use linkvault_cache::{DatabasePool, SqliteCacheStorage};
use linkvault_core::domain::{HttpResponse, RequestSnapshot};
use linkvault_core::ports::{ICacheStorage, IHttpFetcher};
use linkvault_offline::{BuildManifest, CacheLifecycle, CacheTierManager};

// ============================================================================
// Test helpers
// ============================================================================

/// Serves a fixed set of paths; everything else is a network error
#[derive(Default)]
struct StaticOrigin {
    pages: HashMap<String, HttpResponse>,
}

impl StaticOrigin {
    fn page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(
            path.to_string(),
            HttpResponse::new(200).with_body(body.as_bytes().to_vec()),
        );
        self
    }
}

#[async_trait::async_trait]
impl IHttpFetcher for StaticOrigin {
    async fn fetch(&self, request: &RequestSnapshot) -> anyhow::Result<HttpResponse> {
        self.pages
            .get(request.url())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

async fn setup(origin: StaticOrigin, version: &str) -> (Arc<SqliteCacheStorage>, CacheTierManager) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let storage = Arc::new(SqliteCacheStorage::new(pool.pool().clone()));
    let manifest = BuildManifest::new(Some(version.to_string()), vec!["/_app/start.js".to_string()]);
    let manager = CacheTierManager::new(storage.clone(), Arc::new(origin), manifest);
    (storage, manager)
}

async fn settle(manager: &CacheTierManager) {
    manager.tracker().close();
    manager.tracker().wait().await;
    manager.tracker().reopen();
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_sixty_entries_keep_newest_fifty() {
    let (storage, manager) = setup(StaticOrigin::default(), "v1").await;

    for i in 0..60 {
        manager
            .put_runtime(&format!("/bookmarks/{i}"), &HttpResponse::new(200))
            .await
            .unwrap();
    }
    settle(&manager).await;

    let keys = storage.keys("linkvault-runtime-v1").await.unwrap();
    assert_eq!(keys.len(), 50);
    let expected: Vec<String> = (10..60).map(|i| format!("/bookmarks/{i}")).collect();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_install_then_activate_replaces_previous_deploy() {
    let origin = StaticOrigin::default()
        .page("/_app/start.js", "console.log(1)")
        .page("/", "<html>shell</html>");
    let (storage, manager) = setup(origin, "v2").await;

    let stale = HttpResponse::new(200).with_date(Utc::now());
    storage.put("linkvault-build-v1", "/_app/old.js", &stale).await.unwrap();
    storage.put("linkvault-runtime-v1", "/", &stale).await.unwrap();

    manager.install().await.unwrap();
    manager.activate().await.unwrap();
    settle(&manager).await;

    assert_eq!(manager.lifecycle().await, CacheLifecycle::Active);
    let mut names = storage.cache_names().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["linkvault-build-v2", "linkvault-runtime-v2"]);

    let asset = manager.match_build("/_app/start.js").await.unwrap().unwrap();
    assert_eq!(asset.body(), b"console.log(1)");
    let shell = manager.match_runtime("/").await.unwrap().unwrap();
    assert_eq!(shell.body(), b"<html>shell</html>");
}

#[tokio::test]
async fn test_activation_expires_old_entries() {
    let (storage, manager) = setup(StaticOrigin::default(), "v1").await;
    let now = Utc::now();

    storage
        .put(
            "linkvault-runtime-v1",
            "/old",
            &HttpResponse::new(200).with_date(now - Duration::days(8)),
        )
        .await
        .unwrap();
    storage
        .put(
            "linkvault-runtime-v1",
            "/recent",
            &HttpResponse::new(200).with_date(now - Duration::days(1)),
        )
        .await
        .unwrap();

    manager.activate().await.unwrap();
    settle(&manager).await;

    assert_eq!(
        storage.keys("linkvault-runtime-v1").await.unwrap(),
        vec!["/recent"]
    );
}
