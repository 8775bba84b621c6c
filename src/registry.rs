//! Server-side refresh token registry.
//!
//! Maps a user id to the single currently-valid refresh token. Possession
//! of a cookie implies nothing by itself: a refresh token is only good for
//! renewal while it equals the registry entry for its subject, so this is
//! the one revocation mechanism in the system. `put` overwrites, which is
//! how logging in on a second device instantly kills the first device's
//! refresh token.
//!
//! The trait exists so tests can run against an in-process map while a
//! deployment can point at any keyed store with per-key TTL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Registry backend failure. Always treated as fail-closed by callers:
/// a renewal that cannot reach the registry is denied, never waved through.
#[derive(Debug)]
pub struct RegistryError(pub String);

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "refresh token registry error: {}", self.0)
    }
}

impl std::error::Error for RegistryError {}

/// Keyed store with per-key TTL holding the authoritative refresh token
/// per user id.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Upsert. Overwrites any existing entry for the user and resets the
    /// entry's TTL, mirroring the token's own expiry so the registry never
    /// outlives the token it guards.
    async fn put(&self, user_id: i64, token: &str, ttl: Duration) -> Result<(), RegistryError>;

    /// Current entry for the user, or `None` if absent or expired.
    async fn get(&self, user_id: i64) -> Result<Option<String>, RegistryError>;

    /// Remove the entry (logout, account deletion). Returns whether an
    /// entry existed.
    async fn delete(&self, user_id: i64) -> Result<bool, RegistryError>;
}

struct Entry {
    token: String,
    expires_at: Instant,
}

/// In-process TTL map backend. Expired entries are invisible to `get` and
/// reaped by [`MemoryRegistry::sweep_expired`].
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<HashMap<i64, Entry>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all expired entries. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn put(&self, user_id: i64, token: &str, ttl: Duration) -> Result<(), RegistryError> {
        let entry = Entry {
            token: token.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(user_id, entry);
        Ok(())
    }

    async fn get(&self, user_id: i64) -> Result<Option<String>, RegistryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&user_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.token.clone()))
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RegistryError> {
        Ok(self.entries.write().await.remove(&user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[tokio::test]
    async fn test_put_get_delete() {
        let registry = MemoryRegistry::new();

        assert_eq!(registry.get(7).await.unwrap(), None);

        registry.put(7, "token-r1", WEEK).await.unwrap();
        assert_eq!(registry.get(7).await.unwrap(), Some("token-r1".to_string()));

        assert!(registry.delete(7).await.unwrap());
        assert_eq!(registry.get(7).await.unwrap(), None);
        assert!(!registry.delete(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_entry() {
        let registry = MemoryRegistry::new();

        registry.put(7, "token-r1", WEEK).await.unwrap();
        registry.put(7, "token-r2", WEEK).await.unwrap();

        // Only the latest token is authoritative.
        assert_eq!(registry.get(7).await.unwrap(), Some("token-r2".to_string()));
    }

    #[tokio::test]
    async fn test_users_do_not_collide() {
        let registry = MemoryRegistry::new();

        registry.put(7, "token-a", WEEK).await.unwrap();
        registry.put(8, "token-b", WEEK).await.unwrap();

        assert_eq!(registry.get(7).await.unwrap(), Some("token-a".to_string()));
        assert_eq!(registry.get(8).await.unwrap(), Some("token-b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let registry = MemoryRegistry::new();

        registry.put(7, "token-r1", WEEK).await.unwrap();

        tokio::time::advance(WEEK - Duration::from_secs(1)).await;
        assert_eq!(registry.get(7).await.unwrap(), Some("token-r1".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(registry.get(7).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_resets_ttl() {
        let registry = MemoryRegistry::new();

        registry.put(7, "token-r1", WEEK).await.unwrap();
        tokio::time::advance(WEEK / 2).await;

        // Re-login near the half-way point starts a fresh window.
        registry.put(7, "token-r2", WEEK).await.unwrap();
        tokio::time::advance(WEEK - Duration::from_secs(1)).await;

        assert_eq!(registry.get(7).await.unwrap(), Some("token-r2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_entries() {
        let registry = MemoryRegistry::new();

        registry.put(7, "old", Duration::from_secs(10)).await.unwrap();
        registry.put(8, "fresh", WEEK).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(registry.sweep_expired().await, 1);
        assert_eq!(registry.get(8).await.unwrap(), Some("fresh".to_string()));
    }
}
