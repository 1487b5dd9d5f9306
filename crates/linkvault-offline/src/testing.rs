//! In-process fakes for cache tier and router tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use linkvault_core::domain::{HttpResponse, RequestSnapshot};
use linkvault_core::ports::{ICacheStorage, IHttpFetcher};

// ============================================================================
// MemoryStorage
// ============================================================================

/// Named caches kept as ordered `(key, response)` lists
#[derive(Default)]
pub struct MemoryStorage {
    caches: Mutex<BTreeMap<String, Vec<(String, HttpResponse)>>>,
}

impl MemoryStorage {
    pub fn keys_of(&self, cache: &str) -> Vec<String> {
        self.caches
            .lock()
            .unwrap()
            .get(cache)
            .map(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ICacheStorage for MemoryStorage {
    async fn cache_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .caches
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn delete_cache(&self, cache: &str) -> anyhow::Result<bool> {
        Ok(self.caches.lock().unwrap().remove(cache).is_some())
    }

    async fn match_entry(&self, cache: &str, key: &str) -> anyhow::Result<Option<HttpResponse>> {
        Ok(self.caches.lock().unwrap().get(cache).and_then(|entries| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, response)| response.clone())
        }))
    }

    async fn put(&self, cache: &str, key: &str, response: &HttpResponse) -> anyhow::Result<()> {
        let mut caches = self.caches.lock().unwrap();
        let entries = caches.entry(cache.to_string()).or_default();
        entries.retain(|(k, _)| k != key);
        entries.push((key.to_string(), response.clone()));
        Ok(())
    }

    async fn delete(&self, cache: &str, key: &str) -> anyhow::Result<bool> {
        let mut caches = self.caches.lock().unwrap();
        let Some(entries) = caches.get_mut(cache) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        Ok(entries.len() < before)
    }

    async fn keys(&self, cache: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.keys_of(cache))
    }
}

// ============================================================================
// RouteFetcher
// ============================================================================

/// Answers from a fixed URL table; unknown URLs and offline mode fail
#[derive(Default)]
pub struct RouteFetcher {
    routes: HashMap<String, HttpResponse>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl RouteFetcher {
    #[must_use]
    pub fn route(mut self, url: &str, response: HttpResponse) -> Self {
        self.routes.insert(url.to_string(), response);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IHttpFetcher for RouteFetcher {
    async fn fetch(&self, request: &RequestSnapshot) -> anyhow::Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method(), request.url()));
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        self.routes
            .get(request.url())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}
