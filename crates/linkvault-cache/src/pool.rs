//! The SQLite database behind every LinkVault store
//!
//! The retry queue, the metadata sink and the HTTP caches each take a clone of
//! [`DatabasePool::pool`]. Opening a database applies the schema one store
//! table at a time, so a file left behind by an incompatible build fails with
//! the name of the table that could not be brought up to date.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

/// Schema revision recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Connections for a file database: the proxy, the sync task and maintenance
const FILE_CONNECTIONS: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// DDL per store table, applied in order
const STORE_TABLES: &[(&str, &str)] = &[
    (
        "request_queue",
        "CREATE TABLE IF NOT EXISTS request_queue (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            position    INTEGER NOT NULL,
            payload     TEXT    NOT NULL,
            enqueued_at TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_request_queue_position ON request_queue(position);",
    ),
    (
        "bookmark_metadata",
        "CREATE TABLE IF NOT EXISTS bookmark_metadata (
            bookmark_id TEXT PRIMARY KEY,
            state       TEXT NOT NULL,
            title       TEXT,
            updated_at  TEXT NOT NULL
        );",
    ),
    (
        "favicons",
        "CREATE TABLE IF NOT EXISTS favicons (
            domain        TEXT PRIMARY KEY,
            data          TEXT,
            failed        INTEGER NOT NULL DEFAULT 0,
            failed_reason TEXT,
            created_at    TEXT NOT NULL,
            modified_at   TEXT NOT NULL
        );",
    ),
    (
        "http_cache",
        "CREATE TABLE IF NOT EXISTS http_cache (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            cache_name  TEXT    NOT NULL,
            request_key TEXT    NOT NULL,
            status      INTEGER NOT NULL,
            headers     TEXT    NOT NULL,
            body        BLOB    NOT NULL,
            stored_at   TEXT    NOT NULL,
            UNIQUE (cache_name, request_key)
        );
        CREATE INDEX IF NOT EXISTS idx_http_cache_name_seq ON http_cache(cache_name, seq);",
    ),
];

/// Shared handle to the LinkVault database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database file at `db_path`, creating it if missing
    ///
    /// The parent directory must exist. The file runs in WAL mode so the
    /// proxy can read cached responses while the sync task writes.
    ///
    /// # Errors
    ///
    /// - [`CacheError::ConnectionFailed`] if the file cannot be opened
    /// - [`CacheError::SchemaTooNew`] if a newer build already wrote the file
    /// - [`CacheError::Schema`] naming the first table that cannot be created
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{}: {e}", db_path.display())))?;

        let db = Self::prepare(pool).await?;
        info!(path = %db_path.display(), version = SCHEMA_VERSION, "Database ready");
        Ok(db)
    }

    /// Opens a private in-memory database
    ///
    /// An in-memory database lives and dies with its connection, so the pool
    /// holds exactly one and never recycles it.
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let connect_failed =
            |e: sqlx::Error| CacheError::ConnectionFailed(format!("in-memory database: {e}"));
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(connect_failed)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(connect_failed)?;

        let db = Self::prepare(pool).await?;
        debug!("In-memory database ready");
        Ok(db)
    }

    /// The connection pool handed to the stores
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema revision recorded in the database
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        Ok(sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Closes every connection, checkpointing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn prepare(pool: SqlitePool) -> Result<Self, CacheError> {
        let db = Self { pool };

        let found = db.schema_version().await?;
        if found > SCHEMA_VERSION {
            return Err(CacheError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        for &(table, ddl) in STORE_TABLES {
            sqlx::raw_sql(ddl)
                .execute(&db.pool)
                .await
                .map_err(|source| CacheError::Schema { table, source })?;
            debug!(table, "Store table ready");
        }

        // PRAGMA does not accept bound parameters
        let stamp = format!("PRAGMA user_version = {SCHEMA_VERSION}");
        sqlx::raw_sql(&stamp).execute(&db.pool).await?;

        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(db: &DatabasePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_has_every_store_table() {
        let db = DatabasePool::in_memory().await.unwrap();
        let names = table_names(&db).await;
        for &(table, _) in STORE_TABLES {
            assert!(names.iter().any(|n| n == table), "missing {table}");
        }
        assert_eq!(db.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_reopening_a_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkvault.db");

        let first = DatabasePool::new(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO favicons (domain, created_at, modified_at) VALUES ('a.test', 'x', 'x')",
        )
        .execute(first.pool())
        .await
        .unwrap();
        first.close().await;

        let second = DatabasePool::new(&path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favicons")
            .fetch_one(second.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(second.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkvault.db");

        let db = DatabasePool::new(&path).await.unwrap();
        sqlx::raw_sql("PRAGMA user_version = 7")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        match DatabasePool::new(&path).await {
            Err(CacheError::SchemaTooNew { found, supported }) => {
                assert_eq!(found, 7);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("newer schema was accepted"),
        }
    }

    #[tokio::test]
    async fn test_incompatible_table_is_named_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkvault.db");

        let foreign = SqlitePool::connect_with(
            SqliteConnectOptions::new().filename(&path).create_if_missing(true),
        )
        .await
        .unwrap();
        sqlx::raw_sql("CREATE TABLE http_cache (url TEXT PRIMARY KEY)")
            .execute(&foreign)
            .await
            .unwrap();
        foreign.close().await;

        let err = DatabasePool::new(&path).await.err().unwrap();
        assert!(matches!(err, CacheError::Schema { table: "http_cache", .. }));
        assert!(err.to_string().contains("http_cache"));
    }

    #[tokio::test]
    async fn test_missing_directory_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("linkvault.db");
        let err = DatabasePool::new(&path).await.err().unwrap();
        assert!(matches!(err, CacheError::ConnectionFailed(_)));
    }
}
