//! Repository for the `access_logs` table.

use datawatch_core::log_entry::LogEntry;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::access_log::AccessLogRow;

/// Column list for `access_logs` queries.
const COLUMNS: &str = "content_hash, log_time, receiver, info_system, action";

/// Provides read/write operations for stored access-log entries.
pub struct AccessLogRepo;

impl AccessLogRepo {
    /// Insert an entry unless its content hash is already stored.
    ///
    /// Returns `true` when a row was written. Generic over the executor so
    /// the store can run it inside its merge transaction.
    pub async fn insert_if_absent<'e, E>(executor: E, entry: &LogEntry) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO access_logs \
                (content_hash, log_time, receiver, info_system, action) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.content_hash())
        .bind(&entry.timestamp)
        .bind(&entry.receiver)
        .bind(&entry.info_system)
        .bind(&entry.action)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn exists(pool: &SqlitePool, content_hash: &str) -> Result<bool, sqlx::Error> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM access_logs WHERE content_hash = $1")
                .bind(content_hash)
                .fetch_optional(pool)
                .await?;
        Ok(found.is_some())
    }

    /// All entries, newest source timestamp first.
    pub async fn list_newest_first(pool: &SqlitePool) -> Result<Vec<AccessLogRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_logs ORDER BY log_time DESC, content_hash ASC");
        sqlx::query_as::<_, AccessLogRow>(&query).fetch_all(pool).await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM access_logs")
            .fetch_one(pool)
            .await
    }

    /// Delete every entry, returning how many were removed.
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_logs").execute(pool).await?;
        Ok(result.rows_affected())
    }
}
