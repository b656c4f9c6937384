//! Access-log entity model.

use datawatch_core::log_entry::LogEntry;
use sqlx::FromRow;

/// A row from the `access_logs` table.
///
/// `content_hash` is only read back for diagnostics; the domain type always
/// recomputes it from the four fields.
#[derive(Debug, Clone, FromRow)]
pub struct AccessLogRow {
    pub content_hash: String,
    pub log_time: String,
    pub receiver: String,
    pub info_system: String,
    pub action: String,
}

impl From<AccessLogRow> for LogEntry {
    fn from(row: AccessLogRow) -> Self {
        LogEntry::new(row.log_time, row.receiver, row.info_system, row.action)
    }
}
