//! Data sink port (driven/secondary port)
//!
//! The sync engine never touches the application database directly. Every
//! side effect of a delivery attempt goes through this interface: metadata
//! state transitions for a bookmark and favicon cache writes for a domain.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - `save_favicon` is an upsert keyed by domain.

use crate::domain::{BookmarkId, BookmarkMetadata, Domain};

/// Persistence of sync side effects
#[async_trait::async_trait]
pub trait IDataSink: Send + Sync {
    /// Marks a bookmark's metadata as being fetched
    async fn set_pending(&self, id: &BookmarkId) -> anyhow::Result<()>;

    /// Stores fetched metadata; `title` (when present) also replaces the
    /// bookmark's title
    async fn set_success(
        &self,
        id: &BookmarkId,
        metadata: &BookmarkMetadata,
        title: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Records a failed fetch with a human-readable reason
    async fn set_error(&self, id: &BookmarkId, reason: &str) -> anyhow::Result<()>;

    /// Upserts the favicon cache entry for `domain`
    async fn save_favicon(
        &self,
        domain: &Domain,
        data: Option<&str>,
        failed: bool,
        reason: Option<&str>,
    ) -> anyhow::Result<()>;
}
