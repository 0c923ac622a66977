use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Salted Argon2id hashing for passwords and reset secrets.
///
/// The work runs on the blocking pool so request tasks never stall the
/// runtime while a hash is computed.
#[derive(Clone, Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let argon2 = self.argon2.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hash_with(&argon2, &plain))
            .await
            .context("hash task panicked")?
    }

    /// `Ok(false)` on mismatch; errors only when `hash` is not a PHC string.
    pub async fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let argon2 = self.argon2.clone();
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_with(&argon2, &plain, &hash))
            .await
            .context("verify task panicked")?
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

fn verify_with(argon2: &Argon2<'_>, plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(argon2.verify_password(plain.as_bytes(), &parsed).is_ok())
}
