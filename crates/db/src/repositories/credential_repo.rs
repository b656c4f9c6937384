//! Repository for the singleton `credentials` row.

use sqlx::SqlitePool;

pub struct CredentialRepo;

impl CredentialRepo {
    /// Raw JSON cookie jar, if one is stored.
    pub async fn get(pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT cookies FROM credentials WHERE id = 1")
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert(pool: &SqlitePool, cookies_json: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credentials (id, cookies) VALUES (1, $1) \
             ON CONFLICT(id) DO UPDATE SET \
                cookies = excluded.cookies, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(cookies_json)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM credentials WHERE id = 1")
            .execute(pool)
            .await?;
        Ok(())
    }
}
