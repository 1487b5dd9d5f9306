//! SQLite implementation of IDataSink
//!
//! ## Type Mapping
//!
//! | Domain Type             | SQL Type | Strategy                               |
//! |-------------------------|----------|----------------------------------------|
//! | BookmarkId, Domain      | TEXT     | `.as_str()` / `::new()`                |
//! | BookmarkMetadataState   | TEXT     | serde_json, tagged by `status`         |
//! | DateTime<Utc>           | TEXT     | RFC 3339                               |
//! | bool                    | INTEGER  | 0 / 1                                  |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use linkvault_core::domain::{
    BookmarkId, BookmarkMetadata, BookmarkMetadataState, Domain, FaviconCacheEntry,
};
use linkvault_core::ports::IDataSink;

use crate::CacheError;

/// Stores bookmark metadata state and the favicon cache
#[derive(Clone)]
pub struct SqliteDataSink {
    pool: SqlitePool,
}

impl SqliteDataSink {
    /// Creates a sink over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write_state(
        &self,
        id: &BookmarkId,
        state: &BookmarkMetadataState,
        title: Option<&str>,
    ) -> Result<(), CacheError> {
        let state_json = serde_json::to_string(state)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO bookmark_metadata (bookmark_id, state, title, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(bookmark_id) DO UPDATE SET \
                state = excluded.state, \
                title = COALESCE(excluded.title, bookmark_metadata.title), \
                updated_at = excluded.updated_at",
        )
        .bind(id.as_str())
        .bind(state_json)
        .bind(title)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(bookmark_id = %id, state = state.name(), "Metadata state updated");
        Ok(())
    }

    /// Reads back the stored metadata state of a bookmark
    pub async fn metadata_state(
        &self,
        id: &BookmarkId,
    ) -> Result<Option<BookmarkMetadataState>, CacheError> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM bookmark_metadata WHERE bookmark_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        state
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    CacheError::SerializationError(format!("Invalid metadata state '{s}': {e}"))
                })
            })
            .transpose()
    }

    /// Title recorded by the last successful fetch
    pub async fn bookmark_title(&self, id: &BookmarkId) -> Result<Option<String>, CacheError> {
        let title: Option<Option<String>> =
            sqlx::query_scalar("SELECT title FROM bookmark_metadata WHERE bookmark_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(title.flatten())
    }

    /// Looks up the favicon cache entry of a domain
    pub async fn get_favicon(&self, domain: &Domain) -> Result<Option<FaviconCacheEntry>, CacheError> {
        let row = sqlx::query(
            "SELECT domain, data, failed, failed_reason, created_at, modified_at \
             FROM favicons WHERE domain = ?",
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_favicon(&r)).transpose()
    }

    /// Removes the favicon cache entry of a domain
    pub async fn delete_favicon(&self, domain: &Domain) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM favicons WHERE domain = ?")
            .bind(domain.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_favicon(
        &self,
        domain: &Domain,
        data: Option<&str>,
        failed: bool,
        reason: Option<&str>,
    ) -> Result<(), CacheError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO favicons (domain, data, failed, failed_reason, created_at, modified_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(domain) DO UPDATE SET \
                data = excluded.data, \
                failed = excluded.failed, \
                failed_reason = excluded.failed_reason, \
                modified_at = excluded.modified_at",
        )
        .bind(domain.as_str())
        .bind(data)
        .bind(failed)
        .bind(reason)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(domain = %domain, failed, "Favicon cached");
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn row_to_favicon(row: &SqliteRow) -> Result<FaviconCacheEntry, CacheError> {
    let domain: String = row.try_get("domain")?;
    let created_at: String = row.try_get("created_at")?;
    let modified_at: String = row.try_get("modified_at")?;

    Ok(FaviconCacheEntry {
        domain: Domain::new(domain).map_err(|e| CacheError::SerializationError(e.to_string()))?,
        data: row.try_get("data")?,
        failed: row.try_get("failed")?,
        failed_reason: row.try_get("failed_reason")?,
        created_at: parse_datetime(&created_at)?,
        modified_at: parse_datetime(&modified_at)?,
    })
}

#[async_trait::async_trait]
impl IDataSink for SqliteDataSink {
    async fn set_pending(&self, id: &BookmarkId) -> anyhow::Result<()> {
        Ok(self
            .write_state(id, &BookmarkMetadataState::Pending, None)
            .await?)
    }

    async fn set_success(
        &self,
        id: &BookmarkId,
        metadata: &BookmarkMetadata,
        title: Option<&str>,
    ) -> anyhow::Result<()> {
        let state = BookmarkMetadataState::Success(metadata.clone());
        Ok(self.write_state(id, &state, title).await?)
    }

    async fn set_error(&self, id: &BookmarkId, reason: &str) -> anyhow::Result<()> {
        let state = BookmarkMetadataState::Error {
            reason: reason.to_string(),
        };
        Ok(self.write_state(id, &state, None).await?)
    }

    async fn save_favicon(
        &self,
        domain: &Domain,
        data: Option<&str>,
        failed: bool,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(self.upsert_favicon(domain, data, failed, reason).await?)
    }
}
