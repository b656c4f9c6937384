//! Session state entity model.

use datawatch_core::session::{IdentityClaims, SessionState};
use sqlx::FromRow;

/// The singleton row of the `session_state` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub logged_in: bool,
    pub first_use: Option<bool>,
    pub personal_code: String,
    pub first_name: String,
}

impl From<SessionRow> for SessionState {
    fn from(row: SessionRow) -> Self {
        SessionState {
            logged_in: row.logged_in,
            first_use: row.first_use,
            identity: IdentityClaims {
                personal_code: row.personal_code,
                first_name: row.first_name,
            },
        }
    }
}
