//! sqlite backend for the refresh token registry.
//!
//! One row per user id: issuing a new refresh token overwrites the prior
//! entry, which is the single-active-session policy. The row's own expiry
//! mirrors the token's expiry so the registry never outlives the token it
//! guards; expired rows are invisible to `get` and reaped by the cleanup
//! task.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::time::Duration;

use crate::registry::{RegistryError, RegistryStore};

pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the authoritative refresh token for a user.
    pub async fn put(&self, user_id: i64, token: &str, ttl: Duration) -> Result<(), sqlx::Error> {
        let modifier = format!("+{} seconds", ttl.as_secs());
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at)
             VALUES (?, ?, datetime('now', ?))
             ON CONFLICT(user_id) DO UPDATE SET
               token = excluded.token,
               expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(&modifier)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current unexpired entry for a user.
    pub async fn get(&self, user_id: i64) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT token FROM refresh_tokens WHERE user_id = ? AND expires_at > datetime('now')",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(token,)| token))
    }

    /// Remove the entry for a user (logout). Returns whether one existed.
    pub async fn delete(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired rows. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RegistryStore for TokenStore {
    async fn put(&self, user_id: i64, token: &str, ttl: Duration) -> Result<(), RegistryError> {
        TokenStore::put(self, user_id, token, ttl)
            .await
            .map_err(|e| RegistryError(e.to_string()))
    }

    async fn get(&self, user_id: i64) -> Result<Option<String>, RegistryError> {
        TokenStore::get(self, user_id)
            .await
            .map_err(|e| RegistryError(e.to_string()))
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RegistryError> {
        TokenStore::delete(self, user_id)
            .await
            .map_err(|e| RegistryError(e.to_string()))
    }
}
