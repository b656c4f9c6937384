//! Data tracker polling.
//!
//! Fetches the access-usage history, parses it leniently and drops records
//! the user caused themselves. The poller only reports what the tracker
//! currently returns; deciding what is new is the store's job.

use std::collections::HashSet;
use std::sync::Arc;

use datawatch_core::log_entry::LogEntry;
use serde_json::Value;

use crate::transport::{Transport, TransportError};

/// Top-level field holding the usage records.
const USAGES_FIELD: &str = "findUsageResponses";

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Data tracker returned HTTP {0}")]
    HttpStatus(u16),
}

/// Polls the data tracker endpoint.
pub struct DataTrackerPoller {
    transport: Arc<dyn Transport>,
    tracker_url: String,
}

impl DataTrackerPoller {
    pub fn new(transport: Arc<dyn Transport>, tracker_url: impl Into<String>) -> Self {
        Self {
            transport,
            tracker_url: tracker_url.into(),
        }
    }

    /// Fetch the current history minus self-caused records.
    ///
    /// A non-200 response is an error; a body that does not parse yields an
    /// empty result.
    pub async fn poll_once(&self, self_identity: &str) -> Result<Vec<LogEntry>, PollError> {
        let response = self.transport.get(&self.tracker_url).await?;
        if !response.is_ok() {
            return Err(PollError::HttpStatus(response.status));
        }

        let parsed = parse_usages(&response.body);
        let total = parsed.len();
        let entries = without_self_caused(parsed, self_identity);

        tracing::debug!(total, kept = entries.len(), "Parsed data tracker response");
        Ok(entries)
    }
}

/// Drop self-caused records and collapse duplicates, keeping first-seen order.
fn without_self_caused(entries: Vec<LogEntry>, self_identity: &str) -> Vec<LogEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| !entry.is_self_caused(self_identity))
        .filter(|entry| seen.insert(entry.content_hash()))
        .collect()
}

/// Parse a tracker body into entries.
///
/// Missing or null fields become empty strings. Elements that are not
/// objects are skipped. A body that is not JSON, or has no usage array,
/// parses to nothing.
pub fn parse_usages(body: &str) -> Vec<LogEntry> {
    let document: Value = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(error = %e, "Data tracker body is not valid JSON");
            return Vec::new();
        }
    };

    let Some(records) = document.get(USAGES_FIELD).and_then(Value::as_array) else {
        tracing::warn!("Data tracker body has no {USAGES_FIELD} array");
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let Some(record) = record.as_object() else {
                tracing::debug!("Skipping non-object usage record");
                return None;
            };
            let field = |name: &str| match record.get(name) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            Some(LogEntry::new(
                field("logTime"),
                field("receiver"),
                field("infoSystemCode"),
                field("action"),
            ))
        })
        .collect()
}
