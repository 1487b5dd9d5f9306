//! Cache tier manager
//!
//! Owns the two HTTP response caches of a deploy:
//!
//! - the **build** cache, filled once at install with every manifest asset;
//! - the **runtime** cache, filled as application routes are visited, bounded
//!   to `runtime_max_entries` (oldest evicted first) and to `max_age` by the
//!   response `Date` header.
//!
//! ## Lifecycle
//!
//! ```text
//! Installing ──► Installed ──► Activating ──► Active
//! ```
//!
//! Activation deletes the caches of previous deploys and schedules
//! maintenance (trim + expiry). Maintenance also follows every runtime cache
//! write. It runs on the [`TaskTracker`] so it never delays a response, and
//! the daemon waits for it at shutdown.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use linkvault_core::config::CacheConfig;
use linkvault_core::domain::{HttpResponse, RequestSnapshot};
use linkvault_core::ports::{ICacheStorage, IHttpFetcher};
use tokio::sync::{Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::manifest::BuildManifest;
use crate::OfflineError;

/// Default bound of the runtime cache
pub const DEFAULT_RUNTIME_MAX_ENTRIES: usize = 50;

/// Default maximum age of cached responses, in days
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

// ============================================================================
// CacheLifecycle
// ============================================================================

/// Install/activate state of the cache tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLifecycle {
    Installing,
    Installed,
    Activating,
    Active,
}

impl CacheLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for CacheLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Maintenance
// ============================================================================

/// Trim and expiry over both caches; cloned into background tasks
#[derive(Clone)]
struct Maintenance {
    storage: Arc<dyn ICacheStorage + Send + Sync>,
    build_cache: String,
    runtime_cache: String,
    runtime_max_entries: usize,
    max_age: Duration,
    // Serializes passes so concurrent trims don't over-evict.
    lock: Arc<Mutex<()>>,
}

impl Maintenance {
    async fn trim_runtime(&self) -> anyhow::Result<usize> {
        let keys = self.storage.keys(&self.runtime_cache).await?;
        let excess = keys.len().saturating_sub(self.runtime_max_entries);

        for key in keys.iter().take(excess) {
            self.storage.delete(&self.runtime_cache, key).await?;
            debug!(cache = %self.runtime_cache, key = %key, "Evicted runtime entry");
        }
        Ok(excess)
    }

    async fn expire(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut removed = 0;
        for cache in [&self.build_cache, &self.runtime_cache] {
            for key in self.storage.keys(cache).await? {
                let Some(response) = self.storage.match_entry(cache, &key).await? else {
                    continue;
                };
                // Entries without a usable Date header are kept.
                let Some(date) = response.date() else {
                    continue;
                };
                if now - date > self.max_age && self.storage.delete(cache, &key).await? {
                    debug!(cache = %cache, key = %key, "Expired cache entry");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let evicted = self.trim_runtime().await?;
        let expired = self.expire(now).await?;
        if evicted > 0 || expired > 0 {
            info!(evicted, expired, "Cache maintenance finished");
        }
        Ok(())
    }
}

// ============================================================================
// CacheTierManager
// ============================================================================

/// Manages the build and runtime caches of the current deploy
pub struct CacheTierManager {
    fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
    manifest: BuildManifest,
    essential_routes: Vec<String>,
    maintenance: Maintenance,
    lifecycle: RwLock<CacheLifecycle>,
    tracker: TaskTracker,
}

impl CacheTierManager {
    /// Creates a manager with default bounds for the deploy in `manifest`
    pub fn new(
        storage: Arc<dyn ICacheStorage + Send + Sync>,
        fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
        manifest: BuildManifest,
    ) -> Self {
        let maintenance = Maintenance {
            storage,
            build_cache: manifest.build_cache_name(),
            runtime_cache: manifest.runtime_cache_name(),
            runtime_max_entries: DEFAULT_RUNTIME_MAX_ENTRIES,
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
            lock: Arc::new(Mutex::new(())),
        };
        Self {
            fetcher,
            manifest,
            essential_routes: vec!["/".to_string()],
            maintenance,
            lifecycle: RwLock::new(CacheLifecycle::Installing),
            tracker: TaskTracker::new(),
        }
    }

    /// Applies the bounds and essential routes of the `cache` config section
    #[must_use]
    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.essential_routes = config.essential_routes.clone();
        self.maintenance.runtime_max_entries = config.runtime_max_entries;
        self.maintenance.max_age = config.max_age();
        self
    }

    /// Runs background maintenance on `tracker` instead of a private one
    #[must_use]
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    pub fn build_cache(&self) -> &str {
        &self.maintenance.build_cache
    }

    pub fn runtime_cache(&self) -> &str {
        &self.maintenance.runtime_cache
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub async fn lifecycle(&self) -> CacheLifecycle {
        *self.lifecycle.read().await
    }

    async fn set_lifecycle(&self, state: CacheLifecycle) {
        *self.lifecycle.write().await = state;
        debug!(state = %state, "Cache lifecycle changed");
    }

    fn storage(&self) -> &Arc<dyn ICacheStorage + Send + Sync> {
        &self.maintenance.storage
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Fills the build cache and pre-populates the essential routes
    ///
    /// Every manifest asset must be fetched successfully. An essential route
    /// that cannot be fetched is cached as the offline shell instead.
    #[tracing::instrument(skip(self), fields(version = %self.manifest.version()))]
    pub async fn install(&self) -> Result<(), OfflineError> {
        self.set_lifecycle(CacheLifecycle::Installing).await;
        let build_cache = self.build_cache().to_string();

        let existing = self
            .storage()
            .keys(&build_cache)
            .await
            .map_err(OfflineError::Storage)?;

        let mut fetched = 0usize;
        for asset in self.manifest.assets() {
            if existing.contains(asset) {
                continue;
            }
            let response = self
                .fetcher
                .fetch(&RequestSnapshot::get(asset.as_str()))
                .await
                .map_err(|e| OfflineError::Install(format!("{asset}: {e:#}")))?;
            if !response.is_success() {
                return Err(OfflineError::Install(format!(
                    "{asset}: HTTP {}",
                    response.status()
                )));
            }
            self.storage()
                .put(&build_cache, asset, &with_date_header(response))
                .await
                .map_err(OfflineError::Storage)?;
            fetched += 1;
        }

        for route in &self.essential_routes {
            let response = match self.fetcher.fetch(&RequestSnapshot::get(route.as_str())).await {
                Ok(response) if response.is_success() => with_date_header(response),
                Ok(response) => {
                    warn!(route = %route, status = response.status(), "Essential route unavailable, caching offline shell");
                    HttpResponse::offline_shell()
                }
                Err(e) => {
                    warn!(route = %route, error = %e, "Essential route unavailable, caching offline shell");
                    HttpResponse::offline_shell()
                }
            };
            self.storage()
                .put(self.runtime_cache(), route, &response)
                .await
                .map_err(OfflineError::Storage)?;
        }

        info!(
            assets = self.manifest.assets().len(),
            fetched,
            routes = self.essential_routes.len(),
            "Build cache installed"
        );
        self.set_lifecycle(CacheLifecycle::Installed).await;
        Ok(())
    }

    /// Removes caches of other deploys and schedules maintenance
    #[tracing::instrument(skip(self), fields(version = %self.manifest.version()))]
    pub async fn activate(&self) -> Result<(), OfflineError> {
        self.set_lifecycle(CacheLifecycle::Activating).await;

        let names = self
            .storage()
            .cache_names()
            .await
            .map_err(OfflineError::Storage)?;
        for name in names {
            if name == self.build_cache() || name == self.runtime_cache() {
                continue;
            }
            self.storage()
                .delete_cache(&name)
                .await
                .map_err(OfflineError::Storage)?;
            info!(cache = %name, "Deleted stale cache");
        }

        self.schedule_maintenance();
        self.set_lifecycle(CacheLifecycle::Active).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups and writes
    // ------------------------------------------------------------------

    pub async fn match_build(&self, key: &str) -> Result<Option<HttpResponse>, OfflineError> {
        self.storage()
            .match_entry(self.build_cache(), key)
            .await
            .map_err(OfflineError::Storage)
    }

    pub async fn match_runtime(&self, key: &str) -> Result<Option<HttpResponse>, OfflineError> {
        self.storage()
            .match_entry(self.runtime_cache(), key)
            .await
            .map_err(OfflineError::Storage)
    }

    /// Looks `key` up in the build cache, then the runtime cache
    pub async fn match_any(&self, key: &str) -> Result<Option<HttpResponse>, OfflineError> {
        if let Some(response) = self.match_build(key).await? {
            return Ok(Some(response));
        }
        self.match_runtime(key).await
    }

    /// Stores a response in the runtime cache and schedules maintenance
    ///
    /// A `Date` header is added when the response has none, so the entry can
    /// be expired later.
    pub async fn put_runtime(&self, key: &str, response: &HttpResponse) -> Result<(), OfflineError> {
        self.storage()
            .put(self.runtime_cache(), key, &with_date_header(response.clone()))
            .await
            .map_err(OfflineError::Storage)?;
        debug!(cache = %self.runtime_cache(), key = %key, "Cached response");
        self.schedule_maintenance();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Evicts the oldest runtime entries beyond the bound; returns how many
    pub async fn trim_runtime(&self) -> Result<usize, OfflineError> {
        let _guard = self.maintenance.lock.lock().await;
        self.maintenance
            .trim_runtime()
            .await
            .map_err(OfflineError::Storage)
    }

    /// Removes entries of both caches older than the maximum age at `now`
    pub async fn expire_entries(&self, now: DateTime<Utc>) -> Result<usize, OfflineError> {
        let _guard = self.maintenance.lock.lock().await;
        self.maintenance
            .expire(now)
            .await
            .map_err(OfflineError::Storage)
    }

    /// Runs trim and expiry as a tracked background task
    pub fn schedule_maintenance(&self) {
        let maintenance = self.maintenance.clone();
        self.tracker.spawn(async move {
            if let Err(e) = maintenance.run(Utc::now()).await {
                warn!(error = %e, "Cache maintenance failed");
            }
        });
    }
}

fn with_date_header(response: HttpResponse) -> HttpResponse {
    if response.date().is_some() {
        response
    } else {
        response.with_date(Utc::now())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
