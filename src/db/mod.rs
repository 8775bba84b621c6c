mod item;
mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use item::{Item, ItemStore};
pub use token::TokenStore;
pub use user::{User, UserStore, UserView};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table. Email matching is case-sensitive and exact.
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                // Refresh token registry: at most one live entry per user.
                "CREATE TABLE refresh_tokens (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT NOT NULL,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
                // Items, minimal: enough for the resource-owner guard.
                "CREATE TABLE items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    price INTEGER NOT NULL DEFAULT 0,
                    explanation TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_items_user_id ON items(user_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token registry backend.
    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(self.pool.clone())
    }

    /// Get the item store.
    pub fn items(&self) -> ItemStore {
        ItemStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();

        let user = db
            .users()
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "alice");
        assert_eq!(user.password_hash, "$2b$12$hash");

        let user = db.users().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_email_match_is_case_sensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();

        assert!(
            db.users()
                .find_by_email("Alice@Example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();
        let result = db
            .users()
            .create("alice@example.com", "alice2", "$2b$12$hash2")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_token_upsert_keeps_one_entry_per_user() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();

        db.tokens().put(id, "token-r1", WEEK).await.unwrap();
        db.tokens().put(id, "token-r2", WEEK).await.unwrap();

        assert_eq!(
            db.tokens().get(id).await.unwrap(),
            Some("token-r2".to_string())
        );

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_expired_token_row_is_invisible() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();

        db.tokens()
            .put(id, "stale", Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(db.tokens().get(id).await.unwrap(), None);
        assert_eq!(db.tokens().delete_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_refresh_token() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();
        db.tokens().put(id, "token-r1", WEEK).await.unwrap();

        assert!(db.users().delete(id).await.unwrap());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_item_store_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("alice@example.com", "alice", "$2b$12$hash")
            .await
            .unwrap();

        let item_id = db
            .items()
            .create(user_id, "Solar charger", 45000, "Folds flat")
            .await
            .unwrap();

        let item = db.items().get(item_id).await.unwrap().unwrap();
        assert_eq!(item.user_id, user_id);
        assert_eq!(item.price, 45000);

        assert!(
            db.items()
                .update(item_id, "Solar charger v2", 50000, "Folds flatter")
                .await
                .unwrap()
        );
        let item = db.items().get(item_id).await.unwrap().unwrap();
        assert_eq!(item.name, "Solar charger v2");
    }
}
