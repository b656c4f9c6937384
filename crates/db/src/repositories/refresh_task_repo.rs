//! Repository for the singleton `refresh_task` row.

use datawatch_core::refresh::RefreshTask;
use sqlx::SqlitePool;

use crate::models::refresh_task::RefreshTaskRow;

pub struct RefreshTaskRepo;

impl RefreshTaskRepo {
    pub async fn get(pool: &SqlitePool) -> Result<Option<RefreshTask>, sqlx::Error> {
        let row = sqlx::query_as::<_, RefreshTaskRow>(
            "SELECT fire_at, retries_remaining FROM refresh_task WHERE id = 1",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.map(RefreshTask::from))
    }

    /// Store `task` as the pending wake, replacing any previous one.
    pub async fn upsert(pool: &SqlitePool, task: &RefreshTask) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_task (id, fire_at, retries_remaining) VALUES (1, $1, $2) \
             ON CONFLICT(id) DO UPDATE SET \
                fire_at = excluded.fire_at, \
                retries_remaining = excluded.retries_remaining, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(task.fire_at)
        .bind(i64::from(task.retries_remaining))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove and return the pending wake.
    pub async fn take(pool: &SqlitePool) -> Result<Option<RefreshTask>, sqlx::Error> {
        let row = sqlx::query_as::<_, RefreshTaskRow>(
            "DELETE FROM refresh_task WHERE id = 1 RETURNING fire_at, retries_remaining",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.map(RefreshTask::from))
    }

    /// Remove the pending wake. Returns whether one existed.
    pub async fn delete(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_task WHERE id = 1")
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
