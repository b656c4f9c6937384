//! Refresh task entity model.

use datawatch_core::refresh::RefreshTask;
use datawatch_core::types::Timestamp;
use sqlx::FromRow;

/// The singleton row of the `refresh_task` table.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTaskRow {
    pub fire_at: Timestamp,
    pub retries_remaining: i64,
}

impl From<RefreshTaskRow> for RefreshTask {
    fn from(row: RefreshTaskRow) -> Self {
        RefreshTask {
            fire_at: row.fire_at,
            retries_remaining: u32::try_from(row.retries_remaining.max(0)).unwrap_or(u32::MAX),
        }
    }
}
