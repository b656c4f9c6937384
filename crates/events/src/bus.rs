//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`SessionEvent`]s from the agent to whatever is
//! observing it. It is designed to be shared via `Arc<EventBus>`.

use chrono::Utc;
use datawatch_core::session::{KeepAliveState, LogoutReason};
use datawatch_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// A state change observed by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { first_name: String },
    LoggedOut { reason: LogoutReason },
    KeepAlive { state: KeepAliveState },
    /// A cycle stored new access entries; `notified` is false during backfill.
    EntriesInserted { count: usize, notified: bool },
}

/// A [`SessionEvent`] stamped with its publication time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(flatten)]
    pub kind: SessionEvent,
    pub timestamp: Timestamp,
}

impl AgentEvent {
    pub fn new(kind: SessionEvent) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use datawatch_events::bus::{EventBus, SessionEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SessionEvent::EntriesInserted { count: 2, notified: true });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published with no subscriber are dropped.
    pub fn publish(&self, kind: SessionEvent) {
        tracing::debug!(event = ?kind, "Publishing session event");
        // A send error only means there are zero receivers.
        let _ = self.sender.send(AgentEvent::new(kind));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::LoggedOut {
            reason: LogoutReason::Unauthorized { status: 403 },
        });

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(
            received.kind,
            SessionEvent::LoggedOut {
                reason: LogoutReason::Unauthorized { status: 403 }
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SessionEvent::KeepAlive { state: KeepAliveState::Renewed });

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.kind, e2.kind);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(SessionEvent::EntriesInserted { count: 0, notified: false });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = AgentEvent::new(SessionEvent::EntriesInserted { count: 3, notified: true });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "entries_inserted");
        assert_eq!(json["count"], 3);
        assert!(json["timestamp"].is_string());
    }
}
