//! The notification presentation contract.

use datawatch_core::channels::{CHANNEL_ACCESS_LOG, CHANNEL_LOGOUT};
use datawatch_core::display;
use datawatch_core::hashing::notification_key;
use datawatch_core::log_entry::LogEntry;
use serde::Serialize;

use crate::delivery::webhook::WebhookError;

/// A user-facing notification, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Stable identifier; presenting the same key twice replaces rather
    /// than duplicates.
    pub key: String,
    pub channel: &'static str,
    pub title: String,
    pub body: String,
    /// Longer text for expanded views.
    pub details: Option<String>,
}

impl Notification {
    /// Notification announcing one newly observed access.
    pub fn access(entry: &LogEntry) -> Self {
        Self {
            key: notification_key(&entry.content_hash()),
            channel: CHANNEL_ACCESS_LOG,
            title: display::access_title(entry),
            body: display::access_summary(entry),
            details: Some(display::access_details(entry)),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            key: CHANNEL_LOGOUT.to_string(),
            channel: CHANNEL_LOGOUT,
            title: "You have been logged out".to_string(),
            body: "Please log in again to continue.".to_string(),
            details: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Renders notifications to the user.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that writes every notification to the log.
///
/// Used when no presentation layer is configured.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            channel = notification.channel,
            key = %notification.key,
            body = %notification.body,
            "{}",
            notification.title,
        );
        Ok(())
    }
}
