use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};

const USER_COLUMNS: &str = "id, email, username, password_hash, reset_token_hash, \
                            reset_token_expires, created_at, updated_at";

/// Persistence for user records and their reset-token fields.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken email fails with `AppError::DuplicateEmail`.
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> AppResult<User>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;

    /// Every user whose reset token expires strictly after `now`.
    async fn find_by_valid_reset_token(&self, now: OffsetDateTime) -> AppResult<Vec<User>>;

    /// Store a reset-token hash and its expiry, replacing any earlier one.
    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> AppResult<()>;

    /// Swap in a new password hash and clear the reset fields, but only if the
    /// row still holds `expected_token_hash` unexpired at `now`.
    /// Returns whether the row was updated.
    async fn update_password(
        &self,
        user_id: i64,
        expected_token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> AppResult<bool>;

    /// Null the reset fields of every row expired at `now`.
    async fn clear_expired_reset_tokens(&self, now: OffsetDateTime) -> AppResult<u64>;
}

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
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicateEmail,
                _ => AppError::from(e),
            })
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_valid_reset_token(&self, now: OffsetDateTime) -> AppResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_token_hash IS NOT NULL AND reset_token_expires > $1"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(now)
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token_hash = $2,
                   reset_token_expires = $3,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: i64,
        expected_token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3,
                   reset_token_hash = NULL,
                   reset_token_expires = NULL,
                   updated_at = now()
             WHERE id = $1
               AND reset_token_hash = $2
               AND reset_token_expires > $4
            "#,
        )
        .bind(user_id)
        .bind(expected_token_hash)
        .bind(new_password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn clear_expired_reset_tokens(&self, now: OffsetDateTime) -> AppResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET reset_token_hash = NULL,
                   reset_token_expires = NULL,
                   updated_at = now()
             WHERE reset_token_expires <= $1
            "#,
        )
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryUserStore;
