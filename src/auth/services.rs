use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, instrument, warn};

use super::{
    jwt::JwtKeys, password::PasswordService, repo::UserStore, repo_types::User,
    reset::ResetTokens,
};
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    mailer::Mailer,
};

pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset link.";
pub const PASSWORD_RESET_MESSAGE: &str = "Password has been reset successfully";

fn present(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.is_empty())
}

/// Registration, login and password reset over injected collaborators.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    keys: JwtKeys,
    resets: ResetTokens,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        passwords: PasswordService,
        keys: JwtKeys,
        reset_ttl: time::Duration,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resets = ResetTokens::new(users.clone(), passwords.clone(), reset_ttl);
        Self {
            users,
            passwords,
            keys,
            resets,
            mailer,
            clock,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn issue_session(&self, user: &User) -> AppResult<String> {
        let token = self.keys.issue(user).context("jwt sign failed")?;
        Ok(token)
    }

    /// Create an account and return a session token for it.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        email: Option<&str>,
        password: Option<&str>,
        username: Option<&str>,
    ) -> AppResult<String> {
        let (Some(email), Some(password), Some(username)) =
            (present(email), present(password), present(username))
        else {
            warn!("register with missing fields");
            return Err(AppError::missing("Email, password and username are required"));
        };

        let hash = self.passwords.hash(password).await?;
        let user = match self.users.create_user(email, username, &hash).await {
            Ok(u) => u,
            Err(AppError::DuplicateEmail) => {
                warn!("email already registered");
                return Err(AppError::DuplicateEmail);
            }
            Err(e) => return Err(e),
        };

        let token = self.issue_session(&user)?;
        info!(user_id = user.id, "user registered");
        Ok(token)
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip_all)]
    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> AppResult<String> {
        let (Some(email), Some(password)) = (present(email), present(password)) else {
            return Err(AppError::InvalidCredentials);
        };

        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &user.password_hash).await? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.issue_session(&user)?;
        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    /// Always answers with the same message whether or not the account exists.
    /// The token is persisted before the mail goes out, so a delivery
    /// failure leaves a valid outstanding token behind.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: Option<&str>) -> AppResult<&'static str> {
        let Some(email) = present(email) else {
            return Ok(RESET_REQUESTED_MESSAGE);
        };
        let Some(user) = self.users.find_by_email(email).await? else {
            info!("password reset requested for unknown email");
            return Ok(RESET_REQUESTED_MESSAGE);
        };

        let secret = self.resets.issue(user.id, self.clock.now()).await?;
        if let Err(e) = self.mailer.send_password_reset(&user.email, &secret).await {
            error!(user_id = user.id, error = %e, "reset email delivery failed");
            return Err(AppError::Internal(e));
        }
        Ok(RESET_REQUESTED_MESSAGE)
    }

    /// Redeem a reset secret. No session is issued; the user logs in again.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        secret: Option<&str>,
        new_password: Option<&str>,
    ) -> AppResult<&'static str> {
        let Some(secret) = present(secret) else {
            return Err(AppError::InvalidOrExpiredToken);
        };
        let Some(new_password) = present(new_password) else {
            return Err(AppError::missing("New password is required"));
        };
        self.resets
            .redeem(secret, new_password, self.clock.now())
            .await?;
        Ok(PASSWORD_RESET_MESSAGE)
    }

    pub async fn current_user(&self, id: i64) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{jwt::test_keys, repo::MemoryUserStore},
        clock::ManualClock,
        mailer::CapturingMailer,
    };
    use time::{Duration, OffsetDateTime};

    struct Harness {
        auth: AuthService,
        store: Arc<MemoryUserStore>,
        mailer: Arc<CapturingMailer>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryUserStore::default());
        let mailer = Arc::new(CapturingMailer::default());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let auth = AuthService::new(
            store.clone(),
            PasswordService::new(),
            test_keys(),
            Duration::hours(1),
            mailer.clone(),
            clock.clone(),
        );
        Harness {
            auth,
            store,
            mailer,
            clock,
        }
    }

    async fn register_alice(h: &Harness) -> String {
        h.auth
            .register(Some("alice@example.com"), Some("pw123"), Some("alice"))
            .await
            .expect("register")
    }

    #[tokio::test]
    async fn register_requires_all_fields() {
        let h = harness();
        for (e, p, u) in [
            (None, Some("pw"), Some("u")),
            (Some("a@b.c"), None, Some("u")),
            (Some("a@b.c"), Some("pw"), Some("")),
        ] {
            let err = h.auth.register(e, p, u).await.unwrap_err();
            assert!(matches!(err, AppError::MissingField(_)));
        }
        assert_eq!(h.store.len(), 0);
    }

    #[tokio::test]
    async fn register_once_per_email() {
        let h = harness();
        register_alice(&h).await;
        let err = h
            .auth
            .register(Some("alice@example.com"), Some("other"), Some("alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn login_token_decodes_to_user() {
        let h = harness();
        register_alice(&h).await;
        let token = h
            .auth
            .login(Some("alice@example.com"), Some("pw123"))
            .await
            .unwrap();
        let claims = h.auth.keys().verify(&token).unwrap();
        assert_eq!(claims.id, 1);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness();
        register_alice(&h).await;
        let wrong_pw = h
            .auth
            .login(Some("alice@example.com"), Some("nope"))
            .await
            .unwrap_err();
        let no_user = h
            .auth
            .login(Some("bob@example.com"), Some("pw123"))
            .await
            .unwrap_err();
        assert!(matches!(wrong_pw, AppError::InvalidCredentials));
        assert!(matches!(no_user, AppError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_changes_nothing() {
        let h = harness();
        register_alice(&h).await;
        let msg = h
            .auth
            .request_password_reset(Some("nobody@example.com"))
            .await
            .unwrap();
        assert_eq!(msg, RESET_REQUESTED_MESSAGE);
        assert!(h.mailer.sent().is_empty());
        assert!(h
            .store
            .snapshot("alice@example.com")
            .unwrap()
            .reset_token_hash
            .is_none());
    }

    #[tokio::test]
    async fn full_reset_flow() {
        let h = harness();
        register_alice(&h).await;

        let msg = h
            .auth
            .request_password_reset(Some("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(msg, RESET_REQUESTED_MESSAGE);
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        let (to, secret) = sent[0].clone();
        assert_eq!(to, "alice@example.com");

        h.auth
            .reset_password(Some(&secret), Some("newpw456"))
            .await
            .unwrap();
        assert!(h.auth.login(Some("alice@example.com"), Some("newpw456")).await.is_ok());
        assert!(matches!(
            h.auth.login(Some("alice@example.com"), Some("pw123")).await,
            Err(AppError::InvalidCredentials)
        ));

        let again = h.auth.reset_password(Some(&secret), Some("third")).await;
        assert!(matches!(again, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn reset_after_expiry_fails() {
        let h = harness();
        register_alice(&h).await;
        h.auth
            .request_password_reset(Some("alice@example.com"))
            .await
            .unwrap();
        let (_, secret) = h.mailer.sent()[0].clone();

        h.clock.advance(Duration::hours(1) + Duration::seconds(1));
        let err = h
            .auth
            .reset_password(Some(&secret), Some("newpw456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
        assert!(h.auth.login(Some("alice@example.com"), Some("pw123")).await.is_ok());
    }

    #[tokio::test]
    async fn mail_failure_is_internal_but_token_persists() {
        let h = harness();
        register_alice(&h).await;
        h.mailer.fail_next(true);
        let err = h
            .auth
            .request_password_reset(Some("alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(h
            .store
            .snapshot("alice@example.com")
            .unwrap()
            .reset_token_hash
            .is_some());
    }

    #[tokio::test]
    async fn reset_without_secret_is_rejected() {
        let h = harness();
        let err = h.auth.reset_password(None, Some("x")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }
}
