//! [`CredentialStore`] backed by the `credentials` table.

use datawatch_core::credentials::{CredentialStore, Credentials};
use datawatch_core::error::CoreError;

use crate::repositories::CredentialRepo;
use crate::DbPool;

pub struct DbCredentialStore {
    pool: DbPool,
}

impl DbCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn storage_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(e.to_string())
}

#[async_trait::async_trait]
impl CredentialStore for DbCredentialStore {
    async fn get(&self) -> Result<Option<Credentials>, CoreError> {
        let Some(raw) = CredentialRepo::get(&self.pool).await.map_err(storage_error)? else {
            return Ok(None);
        };
        let credentials: Credentials = serde_json::from_str(&raw).map_err(storage_error)?;
        Ok((!credentials.is_empty()).then_some(credentials))
    }

    async fn set(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let raw = serde_json::to_string(credentials).map_err(storage_error)?;
        CredentialRepo::upsert(&self.pool, &raw)
            .await
            .map_err(storage_error)
    }

    async fn clear(&self) -> Result<(), CoreError> {
        CredentialRepo::delete(&self.pool).await.map_err(storage_error)
    }
}
