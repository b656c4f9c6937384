//! Well-known notification channel name constants.
//!
//! Presentation layers group notifications by these names, so they must stay
//! stable across releases.

/// One notification per newly observed data access.
pub const CHANNEL_ACCESS_LOG: &str = "access_log";

/// Session expired or was rejected by the server.
pub const CHANNEL_LOGOUT: &str = "logout";
