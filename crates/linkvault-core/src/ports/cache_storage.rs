//! HTTP cache storage port (driven/secondary port)
//!
//! Named caches of GET responses keyed by request URL. Keys are kept in
//! insertion order so FIFO eviction can trim the oldest entries first.
//!
//! ## Design Notes
//!
//! - `put` on an existing key replaces the response and moves the key to the
//!   newest position.
//! - Caches are created implicitly by the first `put`.

use crate::domain::HttpResponse;

/// Storage of named HTTP response caches
#[async_trait::async_trait]
pub trait ICacheStorage: Send + Sync {
    /// Names of all caches that currently hold at least one entry
    async fn cache_names(&self) -> anyhow::Result<Vec<String>>;

    /// Deletes a whole cache; returns whether anything was removed
    async fn delete_cache(&self, cache: &str) -> anyhow::Result<bool>;

    /// Looks up a cached response
    async fn match_entry(&self, cache: &str, key: &str) -> anyhow::Result<Option<HttpResponse>>;

    /// Stores a response under `key`
    async fn put(&self, cache: &str, key: &str, response: &HttpResponse) -> anyhow::Result<()>;

    /// Removes one entry; returns whether it existed
    async fn delete(&self, cache: &str, key: &str) -> anyhow::Result<bool>;

    /// All keys of a cache, oldest first
    async fn keys(&self, cache: &str) -> anyhow::Result<Vec<String>>;
}
