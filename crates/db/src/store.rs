//! Deduplicated, durable set of access-log entries.
//!
//! [`AccessLogStore`] is the only writer of the `access_logs` table. Every
//! merge runs under an async mutex and inside a single transaction, so the
//! read-diff-write sequence is atomic both within the process and against
//! other connections to the same database file.

use std::collections::HashSet;

use datawatch_core::log_entry::LogEntry;
use tokio::sync::Mutex;

use crate::repositories::AccessLogRepo;
use crate::DbPool;

pub struct AccessLogStore {
    pool: DbPool,
    write_lock: Mutex<()>,
}

impl AccessLogStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Insert every candidate not yet stored and return exactly those.
    ///
    /// Candidates repeating an earlier candidate's content hash are skipped.
    /// On error the transaction rolls back and nothing from this call is
    /// visible.
    pub async fn merge(&self, candidates: &[LogEntry]) -> Result<Vec<LogEntry>, sqlx::Error> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut inserted = Vec::new();

        for entry in candidates {
            if !seen.insert(entry.content_hash()) {
                continue;
            }
            if AccessLogRepo::insert_if_absent(&mut *tx, entry).await? {
                inserted.push(entry.clone());
            }
        }

        tx.commit().await?;

        tracing::debug!(
            candidates = candidates.len(),
            inserted = inserted.len(),
            "Merged access log entries"
        );
        Ok(inserted)
    }

    pub async fn contains(&self, content_hash: &str) -> Result<bool, sqlx::Error> {
        AccessLogRepo::exists(&self.pool, content_hash).await
    }

    /// Every stored entry, newest source timestamp first.
    pub async fn all(&self) -> Result<Vec<LogEntry>, sqlx::Error> {
        let rows = AccessLogRepo::list_newest_first(&self.pool).await?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    pub async fn count(&self) -> Result<u64, sqlx::Error> {
        let count = AccessLogRepo::count(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn clear(&self) -> Result<(), sqlx::Error> {
        let _guard = self.write_lock.lock().await;
        let removed = AccessLogRepo::delete_all(&self.pool).await?;
        tracing::info!(removed, "Cleared access log store");
        Ok(())
    }
}
