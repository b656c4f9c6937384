//! The persisted wake descriptor driving the keepalive cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Transient-failure retries granted to a freshly armed task.
pub const DEFAULT_RETRY_BUDGET: u32 = 20;

/// Delay between successful cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Delay before retrying a renewal that hit a server error.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// A pending scheduled wake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTask {
    pub fire_at: Timestamp,
    pub retries_remaining: u32,
}

impl RefreshTask {
    /// Task firing `delay` after `now`.
    pub fn after(now: Timestamp, delay: Duration, retries_remaining: u32) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        Self {
            fire_at: now.checked_add_signed(delay).unwrap_or(now),
            retries_remaining,
        }
    }

    /// Time left until the task fires; zero when overdue.
    pub fn remaining(&self, now: Timestamp) -> Duration {
        (self.fire_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.fire_at <= now
    }
}
