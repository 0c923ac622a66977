//! Single-use, time-limited password reset secrets.
//!
//! Only the Argon2 hash of a secret is stored. Redemption compares the
//! candidate against every user holding an unexpired token, then swaps the
//! password with a compare-and-set on the matched hash so a secret is
//! redeemable at most once.

use std::{sync::Arc, time::Duration};

use rand::{rngs::OsRng, RngCore};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};

use super::{password::PasswordService, repo::UserStore};
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
};

/// 32 bytes = 256 bits of entropy.
const SECRET_BYTES: usize = 32;

pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct ResetTokens {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    ttl: TimeDuration,
}

impl ResetTokens {
    pub fn new(users: Arc<dyn UserStore>, passwords: PasswordService, ttl: TimeDuration) -> Self {
        Self {
            users,
            passwords,
            ttl,
        }
    }

    /// Generate and persist a fresh secret for `user_id`, returning the
    /// plaintext. Any outstanding secret for that user is overwritten.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: i64, now: OffsetDateTime) -> AppResult<String> {
        let secret = generate_secret();
        let hash = self.passwords.hash(&secret).await?;
        let expires = now + self.ttl;
        self.users.set_reset_token(user_id, &hash, expires).await?;
        debug!(user_id, %expires, "reset token issued");
        Ok(secret)
    }

    #[instrument(skip_all)]
    pub async fn redeem(
        &self,
        secret: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let candidates = self.users.find_by_valid_reset_token(now).await?;

        let mut matched = None;
        for user in candidates {
            if !user.has_live_reset_token(now) {
                continue;
            }
            let Some(stored) = user.reset_token_hash.as_deref() else {
                continue;
            };
            match self.passwords.verify(secret, stored).await {
                Ok(true) => {
                    matched = Some((user.id, stored.to_owned()));
                    break;
                }
                Ok(false) => {}
                Err(e) => warn!(user_id = user.id, error = %e, "unreadable reset token hash"),
            }
        }
        let Some((user_id, stored)) = matched else {
            debug!("no outstanding reset token matched");
            return Err(AppError::InvalidOrExpiredToken);
        };

        let new_hash = self.passwords.hash(new_password).await?;
        if !self
            .users
            .update_password(user_id, &stored, &new_hash, now)
            .await?
        {
            // Redeemed or replaced between the scan and the write.
            debug!(user_id, "reset token lost compare-and-set");
            return Err(AppError::InvalidOrExpiredToken);
        }
        info!(user_id, "password reset");
        Ok(())
    }
}

/// Periodically clear reset fields whose expiry has passed.
pub fn spawn_expired_sweep(
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            match users.clear_expired_reset_tokens(clock.now()).await {
                Ok(0) => {}
                Ok(n) => info!(cleared = n, "expired reset tokens cleared"),
                Err(e) => error!(error = %e, "reset token sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::MemoryUserStore;

    async fn setup() -> (Arc<MemoryUserStore>, ResetTokens, PasswordService) {
        let store = Arc::new(MemoryUserStore::default());
        let passwords = PasswordService::new();
        let resets = ResetTokens::new(store.clone(), passwords.clone(), TimeDuration::hours(1));
        for (email, name) in [("a@example.com", "a"), ("b@example.com", "b")] {
            let hash = passwords.hash("old-password").await.unwrap();
            store.create_user(email, name, &hash).await.unwrap();
        }
        (store, resets, passwords)
    }

    #[test]
    fn secrets_are_256_bit_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), SECRET_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issue_persists_hash_not_plaintext() {
        let (store, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        let secret = resets.issue(1, now).await.unwrap();

        let user = store.snapshot("a@example.com").unwrap();
        let stored = user.reset_token_hash.expect("hash stored");
        assert_ne!(stored, secret);
        assert_eq!(user.reset_token_expires, Some(now + TimeDuration::hours(1)));
    }

    #[tokio::test]
    async fn redeem_matches_correct_user_among_many_candidates() {
        let (store, resets, passwords) = setup().await;
        let now = OffsetDateTime::now_utc();
        let _secret_a = resets.issue(1, now).await.unwrap();
        let secret_b = resets.issue(2, now).await.unwrap();

        resets.redeem(&secret_b, "new-b", now).await.unwrap();

        let a = store.snapshot("a@example.com").unwrap();
        let b = store.snapshot("b@example.com").unwrap();
        assert!(a.reset_token_hash.is_some(), "other user's token untouched");
        assert!(passwords.verify("old-password", &a.password_hash).await.unwrap());
        assert!(b.reset_token_hash.is_none() && b.reset_token_expires.is_none());
        assert!(passwords.verify("new-b", &b.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn redeem_twice_fails() {
        let (_, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        let secret = resets.issue(1, now).await.unwrap();
        resets.redeem(&secret, "first", now).await.unwrap();
        let err = resets.redeem(&secret, "second", now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn redeem_after_expiry_fails() {
        let (store, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        let secret = resets.issue(1, now).await.unwrap();
        let later = now + TimeDuration::hours(1);
        let err = resets.redeem(&secret, "new", later).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
        // Left as-is until overwritten or swept.
        assert!(store.snapshot("a@example.com").unwrap().reset_token_hash.is_some());
    }

    #[tokio::test]
    async fn reissue_invalidates_earlier_secret() {
        let (_, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        let first = resets.issue(1, now).await.unwrap();
        let second = resets.issue(1, now).await.unwrap();
        assert!(resets.redeem(&first, "x", now).await.is_err());
        resets.redeem(&second, "y", now).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_redemptions_succeed_once() {
        let (store, resets, passwords) = setup().await;
        let now = OffsetDateTime::now_utc();
        let secret = resets.issue(1, now).await.unwrap();

        let (first, second) = tokio::join!(
            resets.redeem(&secret, "p1", now),
            resets.redeem(&secret, "p2", now)
        );
        let (won, lost) = match (first, second) {
            (Ok(()), Err(e)) => ("p1", e),
            (Err(e), Ok(())) => ("p2", e),
            other => panic!("expected exactly one success, got {other:?}"),
        };
        assert!(matches!(lost, AppError::InvalidOrExpiredToken));

        let a = store.snapshot("a@example.com").unwrap();
        assert!(passwords.verify(won, &a.password_hash).await.unwrap());
        assert!(a.reset_token_hash.is_none());
    }

    #[tokio::test]
    async fn stale_hash_does_not_update_password() {
        let (store, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        resets.issue(1, now).await.unwrap();
        let before = store.snapshot("a@example.com").unwrap();

        let updated = store
            .update_password(1, "stale-hash", "new-hash", now)
            .await
            .unwrap();
        assert!(!updated);

        let after = store.snapshot("a@example.com").unwrap();
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(after.reset_token_hash, before.reset_token_hash);
    }

    #[tokio::test]
    async fn malformed_stored_hash_does_not_block_other_users() {
        let (store, resets, passwords) = setup().await;
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(1, "not-a-phc-string", now + TimeDuration::hours(1))
            .await
            .unwrap();
        let secret = resets.issue(2, now).await.unwrap();

        resets.redeem(&secret, "new-b", now).await.unwrap();
        let b = store.snapshot("b@example.com").unwrap();
        assert!(passwords.verify("new-b", &b.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn wrong_secret_fails() {
        let (_, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        resets.issue(1, now).await.unwrap();
        let err = resets.redeem(&generate_secret(), "new", now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn clearing_expired_tokens_keeps_live_ones() {
        let (store, resets, _) = setup().await;
        let now = OffsetDateTime::now_utc();
        resets.issue(1, now - TimeDuration::hours(2)).await.unwrap();
        resets.issue(2, now).await.unwrap();

        assert_eq!(store.clear_expired_reset_tokens(now).await.unwrap(), 1);
        let a = store.snapshot("a@example.com").unwrap();
        assert!(a.reset_token_hash.is_none() && a.reset_token_expires.is_none());
        assert!(store.snapshot("b@example.com").unwrap().reset_token_hash.is_some());
    }
}
