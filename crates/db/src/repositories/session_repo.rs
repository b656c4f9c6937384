//! Repository for the singleton `session_state` row.
//!
//! Every write is an upsert on `id = 1`, so callers never need to create
//! the row first. Reading before any write yields the default state.

use datawatch_core::session::{IdentityClaims, SessionState};
use sqlx::SqlitePool;

use crate::models::session::SessionRow;

pub struct SessionRepo;

impl SessionRepo {
    pub async fn get(pool: &SqlitePool) -> Result<SessionState, sqlx::Error> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT logged_in, first_use, personal_code, first_name \
             FROM session_state WHERE id = 1",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.map(SessionState::from).unwrap_or_default())
    }

    /// Record a completed login.
    ///
    /// Sets `logged_in`, stores the identity claims and marks `first_use`
    /// as pending backfill if it has never been set.
    pub async fn record_login(
        pool: &SqlitePool,
        identity: &IdentityClaims,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO session_state (id, logged_in, first_use, personal_code, first_name) \
             VALUES (1, 1, 1, $1, $2) \
             ON CONFLICT(id) DO UPDATE SET \
                logged_in = 1, \
                first_use = COALESCE(session_state.first_use, 1), \
                personal_code = excluded.personal_code, \
                first_name = excluded.first_name, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(&identity.personal_code)
        .bind(&identity.first_name)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_logged_in(pool: &SqlitePool, logged_in: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO session_state (id, logged_in) VALUES (1, $1) \
             ON CONFLICT(id) DO UPDATE SET \
                logged_in = excluded.logged_in, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(logged_in)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_first_use(
        pool: &SqlitePool,
        first_use: Option<bool>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO session_state (id, first_use) VALUES (1, $1) \
             ON CONFLICT(id) DO UPDATE SET \
                first_use = excluded.first_use, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(first_use)
        .execute(pool)
        .await?;
        Ok(())
    }
}
