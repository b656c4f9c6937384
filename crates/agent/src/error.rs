use datawatch_core::error::CoreError;

use crate::transport::TransportError;

/// Failure of an agent operation that the caller has to see.
///
/// Recoverable conditions inside a cycle (a tracker outage, a malformed
/// body, a notifier failure) are logged and absorbed instead.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Identity endpoint returned HTTP {0}")]
    IdentityStatus(u16),
}
