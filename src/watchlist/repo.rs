use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Per-user set of watched coin IDs. The `(user_id, coin_id)` pair is unique.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Coin IDs in insertion order.
    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<String>>;

    /// Returns `true` if a row was deleted.
    async fn remove(&self, user_id: Uuid, coin_id: &str) -> anyhow::Result<bool>;

    /// Returns `false` if the pair already exists.
    async fn insert(&self, user_id: Uuid, coin_id: &str) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgWatchlistStore {
    db: PgPool,
}

impl PgWatchlistStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WatchlistStore for PgWatchlistStore {
    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT coin_id
              FROM watchlist
             WHERE user_id = $1
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list watchlist")?;
        Ok(rows)
    }

    async fn remove(&self, user_id: Uuid, coin_id: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND coin_id = $2")
            .bind(user_id)
            .bind(coin_id)
            .execute(&self.db)
            .await
            .context("delete watchlist entry")?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert(&self, user_id: Uuid, coin_id: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO watchlist (user_id, coin_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, coin_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(coin_id)
        .execute(&self.db)
        .await
        .context("insert watchlist entry")?;
        Ok(res.rows_affected() == 1)
    }
}
