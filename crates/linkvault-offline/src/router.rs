//! Network interception router
//!
//! Decides, per intercepted request, where the response comes from:
//!
//! | Route             | Policy                                                      |
//! |-------------------|-------------------------------------------------------------|
//! | non-GET           | deliver now; on failure queue it and answer `202 queued`    |
//! | build asset       | build cache (network if the asset is missing)               |
//! | API (`/api/...`)  | network only, failures propagate                            |
//! | application route | runtime cache, then network (cached on 200), then the shell |
//! | anything else     | network (cached on 200), then either cache                  |
//!
//! Application routes are paths whose last segment has no `.`.

use std::sync::Arc;

use linkvault_core::config::CacheConfig;
use linkvault_core::domain::{HttpResponse, RequestSnapshot, RATE_LIMITED_REASON};
use linkvault_core::ports::IHttpFetcher;
use linkvault_sync::engine::SyncEngine;
use linkvault_sync::scheduler::SyncTrigger;
use tracing::{debug, info, warn};

use crate::cache_tier::CacheTierManager;
use crate::OfflineError;

/// HTTP status whose responses are written to the runtime cache
const STATUS_OK: u16 = 200;

/// Dispatch category of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Non-GET request, delivered now or deferred to the sync engine
    Deferred,
    BuildAsset,
    Api,
    AppRoute,
    Other,
}

/// Routes intercepted requests between caches, network and the sync engine
pub struct NetworkRouter {
    tiers: Arc<CacheTierManager>,
    engine: Arc<SyncEngine>,
    fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
    trigger: Option<SyncTrigger>,
    api_prefix: String,
    shell_route: String,
}

impl NetworkRouter {
    pub fn new(
        tiers: Arc<CacheTierManager>,
        engine: Arc<SyncEngine>,
        fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
    ) -> Self {
        Self {
            tiers,
            engine,
            fetcher,
            trigger: None,
            api_prefix: "/api/".to_string(),
            shell_route: "/".to_string(),
        }
    }

    /// Uses the API prefix and shell route of the `cache` config section
    #[must_use]
    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.api_prefix = config.api_prefix.clone();
        self.shell_route = config.shell_route.clone();
        self
    }

    /// Fires `trigger` whenever a request is deferred
    #[must_use]
    pub fn with_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Categorizes a request
    pub fn classify(&self, request: &RequestSnapshot) -> RouteKind {
        if !request.is_get() {
            return RouteKind::Deferred;
        }
        let path = request.path();
        if self.tiers.manifest().contains(&path) {
            RouteKind::BuildAsset
        } else if path.starts_with(&self.api_prefix) {
            RouteKind::Api
        } else if is_app_route(&path) {
            RouteKind::AppRoute
        } else {
            RouteKind::Other
        }
    }

    /// Produces the response for an intercepted request
    pub async fn handle(&self, request: RequestSnapshot) -> Result<HttpResponse, OfflineError> {
        let kind = self.classify(&request);
        debug!(method = %request.method(), url = %request.url(), ?kind, "Routing request");

        match kind {
            RouteKind::Deferred => self.deliver_or_defer(request).await,
            RouteKind::BuildAsset => self.serve_build_asset(&request).await,
            RouteKind::Api => self.fetcher.fetch(&request).await.map_err(OfflineError::Network),
            RouteKind::AppRoute => self.serve_app_route(&request).await,
            RouteKind::Other => self.serve_network_first(&request).await,
        }
    }

    async fn deliver_or_defer(&self, request: RequestSnapshot) -> Result<HttpResponse, OfflineError> {
        if let Err(e) = self.engine.mark_pending(&request).await {
            warn!(error = %e, "Could not record pending state");
        }

        let delivery = self.engine.deliver(&request).await;
        if delivery.result.success {
            if let Some(response) = delivery.response {
                return Ok(response);
            }
        }

        if delivery.result.is_rate_limited {
            if let Err(e) = self.engine.mark_error(&request, RATE_LIMITED_REASON).await {
                warn!(error = %e, "Could not record rate-limited state");
            }
        }

        let url = request.url().to_string();
        self.engine
            .enqueue(request)
            .await
            .map_err(|e| OfflineError::Storage(e.into()))?;
        info!(url = %url, "Request deferred to background sync");

        if let Some(trigger) = &self.trigger {
            trigger.request_sync();
        }
        Ok(HttpResponse::queued_ack())
    }

    async fn serve_build_asset(&self, request: &RequestSnapshot) -> Result<HttpResponse, OfflineError> {
        let path = request.path();
        if let Some(response) = self.tiers.match_build(&path).await? {
            return Ok(response);
        }
        debug!(key = %path, "Build asset missing from cache");
        self.fetcher
            .fetch(request)
            .await
            .map_err(|_| OfflineError::NotCached(path))
    }

    async fn serve_app_route(&self, request: &RequestSnapshot) -> Result<HttpResponse, OfflineError> {
        let key = request.cache_key();
        if let Some(response) = self.tiers.match_runtime(key).await? {
            debug!(key = %key, "Runtime cache hit");
            return Ok(response);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status() == STATUS_OK {
                    self.tiers.put_runtime(key, &response).await?;
                }
                Ok(response)
            }
            Err(e) => {
                if let Some(shell) = self.tiers.match_runtime(&self.shell_route).await? {
                    info!(url = %request.url(), "Offline, serving cached shell");
                    return Ok(shell);
                }
                Err(OfflineError::Network(e))
            }
        }
    }

    async fn serve_network_first(
        &self,
        request: &RequestSnapshot,
    ) -> Result<HttpResponse, OfflineError> {
        let key = request.cache_key();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status() == STATUS_OK {
                    self.tiers.put_runtime(key, &response).await?;
                }
                Ok(response)
            }
            Err(e) => match self.tiers.match_any(key).await? {
                Some(cached) => {
                    debug!(key = %key, "Network failed, serving cached copy");
                    Ok(cached)
                }
                None => Err(OfflineError::Network(e)),
            },
        }
    }
}

/// Whether the last path segment has no extension
fn is_app_route(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    !last.contains('.')
}

// ============================================================================
// Unit tests
// ============================================================================
