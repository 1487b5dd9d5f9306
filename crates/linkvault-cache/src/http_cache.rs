//! SQLite implementation of ICacheStorage
//!
//! All named caches share the `http_cache` table. The `seq` column is an
//! autoincrement counter; because `put` deletes and re-inserts, `seq` order is
//! insertion order with re-puts moved to the newest position.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use linkvault_core::domain::HttpResponse;
use linkvault_core::ports::ICacheStorage;

use crate::CacheError;

/// Named HTTP response caches stored in SQLite
#[derive(Clone)]
pub struct SqliteCacheStorage {
    pool: SqlitePool,
}

impl SqliteCacheStorage {
    /// Creates the storage over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of entries in a cache
    pub async fn entry_count(&self, cache: &str) -> Result<usize, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM http_cache WHERE cache_name = ?")
            .bind(cache)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn store(&self, cache: &str, key: &str, response: &HttpResponse) -> Result<(), CacheError> {
        let headers = serde_json::to_string(response.headers())
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM http_cache WHERE cache_name = ? AND request_key = ?")
            .bind(cache)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO http_cache (cache_name, request_key, status, headers, body, stored_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(cache)
        .bind(key)
        .bind(i64::from(response.status()))
        .bind(headers)
        .bind(response.body())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::trace!(cache, key, status = response.status(), "Response cached");
        Ok(())
    }

    async fn load(&self, cache: &str, key: &str) -> Result<Option<HttpResponse>, CacheError> {
        let row = sqlx::query(
            "SELECT status, headers, body FROM http_cache WHERE cache_name = ? AND request_key = ?",
        )
        .bind(cache)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: i64 = row.try_get("status")?;
        let headers: String = row.try_get("headers")?;
        let body: Vec<u8> = row.try_get("body")?;

        let headers: Vec<(String, String)> = serde_json::from_str(&headers).map_err(|e| {
            CacheError::SerializationError(format!("Invalid cached headers for {key}: {e}"))
        })?;
        let status = u16::try_from(status)
            .map_err(|_| CacheError::SerializationError(format!("Invalid cached status {status}")))?;

        let response = headers
            .into_iter()
            .fold(HttpResponse::new(status), |resp, (k, v)| resp.with_header(k, v))
            .with_body(body);
        Ok(Some(response))
    }
}

#[async_trait::async_trait]
impl ICacheStorage for SqliteCacheStorage {
    async fn cache_names(&self) -> anyhow::Result<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT cache_name FROM http_cache GROUP BY cache_name ORDER BY MIN(seq)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::from)?;
        Ok(names)
    }

    async fn delete_cache(&self, cache: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM http_cache WHERE cache_name = ?")
            .bind(cache)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn match_entry(&self, cache: &str, key: &str) -> anyhow::Result<Option<HttpResponse>> {
        Ok(self.load(cache, key).await?)
    }

    async fn put(&self, cache: &str, key: &str, response: &HttpResponse) -> anyhow::Result<()> {
        Ok(self.store(cache, key, response).await?)
    }

    async fn delete(&self, cache: &str, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM http_cache WHERE cache_name = ? AND request_key = ?")
            .bind(cache)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self, cache: &str) -> anyhow::Result<Vec<String>> {
        let keys = sqlx::query_scalar(
            "SELECT request_key FROM http_cache WHERE cache_name = ? ORDER BY seq ASC",
        )
        .bind(cache)
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::from)?;
        Ok(keys)
    }
}
