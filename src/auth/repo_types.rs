use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the credential store.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String, // Argon2 hash, never exposed
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Whether an unredeemed reset secret is still usable at `now`.
    pub fn has_live_reset_token(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.reset_token_hash, self.reset_token_expires),
            (Some(_), Some(exp)) if exp > now
        )
    }
}
