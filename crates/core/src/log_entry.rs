//! Access-log records and their content-derived dedup key.

use serde::{Deserialize, Serialize};

/// Separator placed between length-prefixed fields of a content hash.
const FIELD_SEPARATOR: char = '|';

/// Derive the dedup key for a record from its four fields.
///
/// Each field is written as `<byte length>:<value>` and the four parts are
/// joined with `|`. The length prefix keeps the encoding injective even when
/// a field itself contains the separator.
pub fn content_hash(timestamp: &str, receiver: &str, info_system: &str, action: &str) -> String {
    let mut out = String::with_capacity(
        timestamp.len() + receiver.len() + info_system.len() + action.len() + 16,
    );
    for (i, field) in [timestamp, receiver, info_system, action].iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.push_str(&field.len().to_string());
        out.push(':');
        out.push_str(field);
    }
    out
}

/// One data-access record reported by the tracker API.
///
/// Two entries with equal fields are the same entry; the dedup key is always
/// recomputed from the fields via [`LogEntry::content_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event time as reported by the source (`logTime`), kept verbatim.
    pub timestamp: String,
    /// Party that accessed the data.
    pub receiver: String,
    /// Code of the queried source system.
    pub info_system: String,
    /// Action code, e.g. a view or query.
    pub action: String,
}

impl LogEntry {
    pub fn new(
        timestamp: impl Into<String>,
        receiver: impl Into<String>,
        info_system: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            receiver: receiver.into(),
            info_system: info_system.into(),
            action: action.into(),
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(
            &self.timestamp,
            &self.receiver,
            &self.info_system,
            &self.action,
        )
    }

    /// Whether this access was made by the signed-in user themselves.
    ///
    /// Substring match on the receiver. An empty identity never matches.
    pub fn is_self_caused(&self, self_identity: &str) -> bool {
        !self_identity.is_empty() && self.receiver.contains(self_identity)
    }
}
