//! SQLite implementation of IRequestQueue
//!
//! Entries are ordered by an integer `position` column rather than by row id,
//! so an entry can be put back in front of everything else:
//!
//! | Operation | Position                          |
//! |-----------|-----------------------------------|
//! | `push`    | `MAX(position) + 1` (0 if empty)  |
//! | `unshift` | `MIN(position) - 1` (0 if empty)  |
//! | `shift`   | row with the lowest position      |
//!
//! The payload column holds the [`QueuedRequest`] JSON exactly as it was
//! pushed, so a shifted-then-unshifted entry comes back byte-identical.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

use linkvault_core::domain::QueuedRequest;
use linkvault_core::ports::IRequestQueue;

use crate::CacheError;

/// Default maximum age of a queued entry
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Durable retry queue stored in the `request_queue` table
#[derive(Clone)]
pub struct SqliteRequestQueue {
    pool: SqlitePool,
    retention: Duration,
}

impl SqliteRequestQueue {
    /// Creates a queue with the default 24 hour retention
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
        }
    }

    /// Overrides the retention after which entries are discarded
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Retention currently applied by [`shift`](IRequestQueue::shift)
    pub fn retention(&self) -> Duration {
        self.retention
    }

    async fn insert_at(&self, entry: &QueuedRequest, front: bool) -> Result<(), CacheError> {
        let payload = entry
            .to_json()
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let sql = if front {
            "INSERT INTO request_queue (position, payload, enqueued_at) \
             VALUES ((SELECT COALESCE(MIN(position), 1) - 1 FROM request_queue), ?, ?)"
        } else {
            "INSERT INTO request_queue (position, payload, enqueued_at) \
             VALUES ((SELECT COALESCE(MAX(position), -1) + 1 FROM request_queue), ?, ?)"
        };

        sqlx::query(sql)
            .bind(payload)
            .bind(entry.enqueued_at().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes and returns the front entry, discarding expired ones
    pub async fn shift_at(&self, now: DateTime<Utc>) -> Result<Option<QueuedRequest>, CacheError> {
        loop {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query(
                "SELECT id, payload FROM request_queue ORDER BY position ASC, id ASC LIMIT 1",
            )
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                tx.commit().await?;
                return Ok(None);
            };

            let id: i64 = row.try_get("id")?;
            let payload: String = row.try_get("payload")?;

            sqlx::query("DELETE FROM request_queue WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            let entry = match QueuedRequest::from_json(&payload) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(row_id = id, error = %e, "Discarding unreadable queue entry");
                    continue;
                }
            };

            if entry.is_expired(now, self.retention) {
                tracing::warn!(
                    row_id = id,
                    url = %entry.request().url(),
                    enqueued_at = %entry.enqueued_at(),
                    "Discarding queue entry past retention"
                );
                continue;
            }

            return Ok(Some(entry));
        }
    }

    /// Number of stored rows
    pub async fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM request_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Raw payloads in queue order, for inspection
    pub async fn payloads(&self) -> Result<Vec<String>, CacheError> {
        let payloads = sqlx::query_scalar(
            "SELECT payload FROM request_queue ORDER BY position ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(payloads)
    }
}

#[async_trait::async_trait]
impl IRequestQueue for SqliteRequestQueue {
    async fn push(&self, entry: &QueuedRequest) -> anyhow::Result<()> {
        self.insert_at(entry, false).await?;
        tracing::debug!(url = %entry.request().url(), "Request pushed to retry queue");
        Ok(())
    }

    async fn shift(&self) -> anyhow::Result<Option<QueuedRequest>> {
        Ok(self.shift_at(Utc::now()).await?)
    }

    async fn unshift(&self, entry: &QueuedRequest) -> anyhow::Result<()> {
        self.insert_at(entry, true).await?;
        tracing::debug!(url = %entry.request().url(), "Request re-inserted at queue front");
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.count().await?)
    }
}
