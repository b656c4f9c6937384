//! Persisted login state of the single signed-in user.

use serde::{Deserialize, Serialize};

/// Identity claims extracted once after login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Personal identification code without the country prefix.
    pub personal_code: String,
    pub first_name: String,
}

impl IdentityClaims {
    /// Country prefix the identity provider puts in front of personal codes.
    pub const COUNTRY_PREFIX: &'static str = "EE";

    /// Build claims from raw provider values, stripping the country prefix.
    pub fn from_raw(personal_code: &str, first_name: &str) -> Self {
        let personal_code = personal_code
            .trim()
            .strip_prefix(Self::COUNTRY_PREFIX)
            .unwrap_or(personal_code.trim());
        Self {
            personal_code: personal_code.to_string(),
            first_name: first_name.trim().to_string(),
        }
    }
}

/// Lifecycle of a session renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepAliveState {
    Idle,
    Renewing,
    Renewed,
    RetryScheduled,
    LoggedOut,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user logged out explicitly.
    UserRequested,
    /// The renewal endpoint rejected the session with this status.
    Unauthorized { status: u16 },
}

/// Login state shared between the scheduler and any observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub logged_in: bool,
    /// `None` until the first login, `Some(true)` until the backfill cycle
    /// has run, then `Some(false)`.
    pub first_use: Option<bool>,
    pub identity: IdentityClaims,
}

impl SessionState {
    /// Whether the next cycle is the initial backfill and must stay silent.
    pub fn in_backfill(&self) -> bool {
        self.first_use != Some(false)
    }

    /// String matched against record receivers to drop self-caused accesses.
    pub fn self_identity(&self) -> &str {
        &self.identity.personal_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_country_prefix() {
        let claims = IdentityClaims::from_raw("EE38001010000", "Mari");
        assert_eq!(claims.personal_code, "38001010000");
        assert_eq!(claims.first_name, "Mari");
    }

    #[test]
    fn keeps_code_without_prefix() {
        let claims = IdentityClaims::from_raw("38001010000", "");
        assert_eq!(claims.personal_code, "38001010000");
    }

    #[test]
    fn backfill_until_first_use_cleared() {
        let mut state = SessionState::default();
        assert!(state.in_backfill());
        state.first_use = Some(true);
        assert!(state.in_backfill());
        state.first_use = Some(false);
        assert!(!state.in_backfill());
    }
}
