use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the plaintext reset `secret` to `to`.
    async fn send_password_reset(&self, to: &str, secret: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

/// Sends mail through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    client_url: String,
    link_lifetime: String,
}

impl ResendMailer {
    /// `reset_ttl_minutes` is only used to word the expiry notice.
    pub fn new(http: reqwest::Client, cfg: &MailConfig, reset_ttl_minutes: i64) -> Self {
        Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
            client_url: cfg.client_url.trim_end_matches('/').to_string(),
            link_lifetime: describe_lifetime(reset_ttl_minutes),
        }
    }

    fn reset_link(&self, secret: &str) -> String {
        format!("{}/reset-password?token={}", self.client_url, secret)
    }
}

fn describe_lifetime(minutes: i64) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    if minutes > 0 && minutes % 60 == 0 {
        plural(minutes / 60, "hour")
    } else {
        plural(minutes, "minute")
    }
}

fn reset_email_html(link: &str, lifetime: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h2>Reset Your Password</h2>
    <p>You recently requested to reset your password. Click the link below to reset it:</p>
    <p><a href="{link}">Reset Password</a></p>
    <p>This link will expire in {lifetime} for security reasons.</p>
    <p>If you didn't request this reset, you can safely ignore this email.</p>
    <p>Best regards,<br>The Lex Team</p>
</div>"#
    )
}

#[async_trait]
impl Mailer for ResendMailer {
    #[instrument(skip(self, secret))]
    async fn send_password_reset(&self, to: &str, secret: &str) -> anyhow::Result<()> {
        let body = OutgoingEmail {
            from: &self.from,
            to: [to],
            subject: "Reset Your Password - Lex Vocabulary App",
            html: reset_email_html(&self.reset_link(secret), &self.link_lifetime),
        };
        let res = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to send password reset email")?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            error!(%status, detail = %detail, "mail api rejected message");
            anyhow::bail!("failed to send password reset email: {status}");
        }
        info!("password reset email sent");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use capture::CapturingMailer;
