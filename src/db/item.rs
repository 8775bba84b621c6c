//! Minimal item storage.
//!
//! The wider item/order catalogue lives outside this subsystem; this store
//! carries just enough for the resource-owner guard, which must fetch an
//! item's owning user id before comparing it against the session subject.

use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Item {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub price: i64,
    pub explanation: String,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    user_id: i64,
    name: String,
    price: i64,
    explanation: String,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            price: row.price,
            explanation: row.explanation,
        }
    }
}

pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        price: i64,
        explanation: &str,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO items (user_id, name, price, explanation) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(name)
                .bind(price)
                .bind(explanation)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Item>, sqlx::Error> {
        let row: Option<ItemRow> =
            sqlx::query_as("SELECT id, user_id, name, price, explanation FROM items WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Item::from))
    }

    pub async fn update(
        &self,
        id: i64,
        name: &str,
        price: i64,
        explanation: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE items SET name = ?, price = ?, explanation = ? WHERE id = ?")
                .bind(name)
                .bind(price)
                .bind(explanation)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
