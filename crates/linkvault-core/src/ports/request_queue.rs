//! Retry queue port (driven/secondary port)
//!
//! A durable FIFO of [`QueuedRequest`]s. Each operation is individually
//! atomic; callers must not assume exclusive access across await points.

use crate::domain::QueuedRequest;

/// Durable, ordered queue of deferred requests
#[async_trait::async_trait]
pub trait IRequestQueue: Send + Sync {
    /// Appends an entry at the back
    async fn push(&self, entry: &QueuedRequest) -> anyhow::Result<()>;

    /// Removes and returns the front entry
    ///
    /// Entries older than the queue's retention are discarded on the way and
    /// never returned. Returns `None` when no live entry remains.
    async fn shift(&self) -> anyhow::Result<Option<QueuedRequest>>;

    /// Re-inserts an entry at the front
    async fn unshift(&self, entry: &QueuedRequest) -> anyhow::Result<()>;

    /// Number of stored entries (including not yet discarded expired ones)
    async fn len(&self) -> anyhow::Result<usize>;

    /// Whether the queue holds no entries
    async fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len().await? == 0)
    }
}
