//! LinkVault Offline - Tiered HTTP caching and request routing
//!
//! Provides:
//! - The build manifest that names the deploy's static assets and cache version
//! - The cache tier manager (build cache + bounded runtime cache)
//! - The network interception router deciding cache vs network vs deferral
//!
//! ## Modules
//!
//! - [`manifest`] - Build manifest loading and cache naming
//! - [`cache_tier`] - Install/activate lifecycle, eviction and expiry
//! - [`router`] - Per-request dispatch policy

pub mod cache_tier;
pub mod manifest;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use cache_tier::{CacheLifecycle, CacheTierManager};
pub use manifest::BuildManifest;
pub use router::{NetworkRouter, RouteKind};

use thiserror::Error;

/// Errors surfaced by the offline layer
#[derive(Debug, Error)]
pub enum OfflineError {
    /// The build manifest could not be read or parsed
    #[error("Invalid build manifest: {0}")]
    Manifest(String),

    /// Installing the build cache failed
    #[error("Install failed: {0}")]
    Install(String),

    /// The network failed and no cached response could stand in
    #[error("Network request failed: {0:#}")]
    Network(anyhow::Error),

    /// A cache-only lookup missed
    #[error("Not cached: {0}")]
    NotCached(String),

    /// Cache or queue storage failed
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}
