//! LinkVault Sync - Background delivery of deferred requests
//!
//! Provides:
//! - Retry delay policy (exponential backoff, `Retry-After` parsing)
//! - Outcome classification of delivery attempts
//! - A reqwest-based HTTP fetcher
//! - The queue-draining sync engine and its scheduler
//!
//! ## Modules
//!
//! - [`backoff`] - Delay computation for failures and rate limits
//! - [`classifier`] - Maps responses to success / rate limited / failure
//! - [`client`] - `IHttpFetcher` implementation over reqwest
//! - [`engine`] - Drain cycles over the retry queue
//! - [`scheduler`] - Periodic and on-demand drain triggering

pub mod backoff;
pub mod classifier;
pub mod client;
pub mod engine;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use thiserror::Error;

/// Errors that can end a drain cycle
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server answered 429; the entry is back at the front of the queue
    #[error("Rate limited, retry after {}ms", .retry_after.as_millis())]
    RateLimited {
        /// How long to wait before the next drain
        retry_after: Duration,
    },

    /// The retry queue storage failed
    #[error("Queue error: {0:#}")]
    Queue(anyhow::Error),

    /// Writing a side effect through the data sink failed
    #[error("Data sink error: {0:#}")]
    Sink(anyhow::Error),
}
