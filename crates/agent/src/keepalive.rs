//! Session renewal against the portal's keepalive endpoint.

use std::sync::Arc;

use datawatch_core::session::KeepAliveState;
use datawatch_events::{EventBus, SessionEvent};
use tokio::sync::watch;

use crate::transport::{Transport, TransportError};

/// Classified outcome of one renewal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewResult {
    /// HTTP 200: the session is alive.
    Success,
    /// HTTP 500: transient, worth retrying after a backoff.
    ServerError,
    /// Any other status: the session is gone and the user has to log in again.
    Unauthorized { status: u16 },
}

impl RenewResult {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Success,
            500 => Self::ServerError,
            _ => Self::Unauthorized { status },
        }
    }

    fn next_state(self) -> KeepAliveState {
        match self {
            Self::Success => KeepAliveState::Renewed,
            Self::Unauthorized { .. } => KeepAliveState::LoggedOut,
            Self::ServerError => KeepAliveState::RetryScheduled,
        }
    }
}

/// Renews the portal session and exposes the current [`KeepAliveState`].
///
/// State changes are readable through a `watch` channel and are also
/// published on the [`EventBus`].
pub struct SessionKeepAlive {
    transport: Arc<dyn Transport>,
    renew_url: String,
    state: watch::Sender<KeepAliveState>,
    bus: Arc<EventBus>,
}

impl SessionKeepAlive {
    pub fn new(
        transport: Arc<dyn Transport>,
        renew_url: impl Into<String>,
        bus: Arc<EventBus>,
    ) -> Self {
        let (state, _) = watch::channel(KeepAliveState::Idle);
        Self {
            transport,
            renew_url: renew_url.into(),
            state,
            bus,
        }
    }

    /// Send one renewal request and classify the response.
    ///
    /// A transport failure leaves the state at `RetryScheduled`; the caller
    /// decides when to try again.
    pub async fn renew(&self) -> Result<RenewResult, TransportError> {
        self.set_state(KeepAliveState::Renewing);

        match self.transport.get(&self.renew_url).await {
            Ok(response) => {
                let result = RenewResult::from_status(response.status);
                tracing::info!(status = response.status, ?result, "Session renewal finished");
                self.set_state(result.next_state());
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session renewal request failed");
                self.set_state(KeepAliveState::RetryScheduled);
                Err(e)
            }
        }
    }

    pub fn state(&self) -> KeepAliveState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<KeepAliveState> {
        self.state.subscribe()
    }

    /// Back to `Idle` for a fresh session.
    pub fn reset(&self) {
        self.set_state(KeepAliveState::Idle);
    }

    pub fn mark_logged_out(&self) {
        self.set_state(KeepAliveState::LoggedOut);
    }

    fn set_state(&self, next: KeepAliveState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            self.bus.publish(SessionEvent::KeepAlive { state: next });
        }
    }
}
