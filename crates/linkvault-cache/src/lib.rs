//! LinkVault Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - The durable retry queue of deferred requests
//! - Bookmark metadata state and the per-domain favicon cache
//! - Named HTTP response caches (build and runtime tiers)
//!
//! ## Architecture
//!
//! This crate implements the `IRequestQueue`, `IDataSink` and `ICacheStorage`
//! ports from `linkvault-core` using SQLite as the storage backend. It is a
//! driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Shared SQLite pool that applies and checks the schema
//! - [`SqliteRequestQueue`] - `IRequestQueue` implementation
//! - [`SqliteDataSink`] - `IDataSink` implementation plus read-back queries
//! - [`SqliteCacheStorage`] - `ICacheStorage` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use linkvault_cache::{DatabasePool, SqliteRequestQueue};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/linkvault/linkvault.db")).await?;
//! let queue = SqliteRequestQueue::new(pool.pool().clone());
//! // Use queue as IRequestQueue...
//! # Ok(())
//! # }
//! ```

pub mod http_cache;
pub mod pool;
pub mod queue;
pub mod sink;

pub use http_cache::SqliteCacheStorage;
pub use pool::DatabasePool;
pub use queue::SqliteRequestQueue;
pub use sink::SqliteDataSink;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A store table could not be created or brought up to date
    #[error("Could not prepare the {table} table: {source}")]
    Schema {
        table: &'static str,
        source: sqlx::Error,
    },

    /// The database was written by a newer LinkVault build
    #[error("Database schema v{found} is newer than the supported v{supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
