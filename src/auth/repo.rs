use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Persisted user credentials. Uniqueness of `email` is enforced by the store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Returns `None` if the email is already taken.
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>>;

    /// Overwrites any previous token for the user.
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;

    /// Finds the user whose pending token matches and is still valid at `now`.
    async fn find_by_reset_token(
        &self,
        email: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;

    /// Swaps the password hash and clears both reset fields in one step.
    /// Returns `false` if the token was not valid (already used, expired, replaced).
    async fn complete_reset(
        &self,
        email: &str,
        token: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, reset_token, reset_token_expiry, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token = $2, reset_token_expiry = $3
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("store reset token")?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        email: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE email = $1 AND reset_token = $2 AND reset_token_expiry > $3
            "#
        ))
        .bind(email)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        Ok(user)
    }

    async fn complete_reset(
        &self,
        email: &str,
        token: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $4, reset_token = NULL, reset_token_expiry = NULL
             WHERE email = $1 AND reset_token = $2 AND reset_token_expiry > $3
            "#,
        )
        .bind(email)
        .bind(token)
        .bind(now)
        .bind(new_password_hash)
        .execute(&self.db)
        .await
        .context("complete password reset")?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;

    /// In-process stand-in for `PgUserStore` with the same matching rules.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserStore {
        pub fn snapshot(&self, email: &str) -> Option<User> {
            let users = self.users.lock().unwrap();
            users.iter().find(|u| u.email == email).cloned()
        }
    }

    fn token_matches(u: &User, email: &str, token: &str, now: OffsetDateTime) -> bool {
        u.email == email
            && u.reset_token.as_deref() == Some(token)
            && u.reset_token_expiry.is_some_and(|exp| exp > now)
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self.snapshot(email))
        }

        async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == email) {
                return Ok(None);
            }
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                reset_token: None,
                reset_token_expiry: None,
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(user.clone());
            Ok(Some(user))
        }

        async fn set_reset_token(
            &self,
            user_id: Uuid,
            token: &str,
            expires_at: OffsetDateTime,
        ) -> anyhow::Result<()> {
            let mut users = self.users.lock().unwrap();
            if let Some(u) = users.iter_mut().find(|u| u.id == user_id) {
                u.reset_token = Some(token.to_string());
                u.reset_token_expiry = Some(expires_at);
            }
            Ok(())
        }

        async fn find_by_reset_token(
            &self,
            email: &str,
            token: &str,
            now: OffsetDateTime,
        ) -> anyhow::Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| token_matches(u, email, token, now)).cloned())
        }

        async fn complete_reset(
            &self,
            email: &str,
            token: &str,
            now: OffsetDateTime,
            new_password_hash: &str,
        ) -> anyhow::Result<bool> {
            let mut users = self.users.lock().unwrap();
            match users.iter_mut().find(|u| token_matches(u, email, token, now)) {
                Some(u) => {
                    u.password_hash = new_password_hash.to_string();
                    u.reset_token = None;
                    u.reset_token_expiry = None;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
