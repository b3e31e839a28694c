use crate::config::MailConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Hands a message to the delivery channel.
    ///
    /// # Errors
    /// Returns `AppError::Upstream` if the channel refuses the message.
    async fn send(&self, email: Email) -> Result<()>;
}

/// Writes messages to the log instead of delivering them. Used when no relay is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, body = %email.text, "Mail relay not configured, logging message");
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMailer {
    #[must_use]
    pub const fn new(http: reqwest::Client, endpoint: String, token: Option<String>) -> Self {
        Self { http, endpoint, token }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[tracing::instrument(skip(self, email), fields(to = %email.to), err(level = "warn"))]
    async fn send(&self, email: Email) -> Result<()> {
        let mut request = self.http.post(&self.endpoint).json(&email);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| AppError::Upstream(format!("mail relay unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!("mail relay answered {}", response.status())));
        }
        Ok(())
    }
}

/// Composes the account emails and hands them to the configured [`Mailer`].
#[derive(Clone, Debug)]
pub struct MailService {
    mailer: Arc<dyn Mailer>,
    from: String,
    app_name: String,
}

impl MailService {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, config: &MailConfig) -> Self {
        Self { mailer, from: config.mail_from.clone(), app_name: config.app_name.clone() }
    }

    /// # Errors
    /// Propagates delivery failures from the mailer.
    pub async fn send_otp(&self, to: &str, username: &str, otp: u32, ttl_minutes: i64) -> Result<()> {
        let email = Email {
            from: self.from.clone(),
            to: to.to_string(),
            subject: format!("{} - Verify Your Email", self.app_name),
            text: format!(
                "Hello {},\n\nYour verification code is {otp}.\nIt expires in {ttl_minutes} minutes.\n",
                username.to_uppercase()
            ),
        };
        self.mailer.send(email).await
    }

    /// # Errors
    /// Propagates delivery failures from the mailer.
    pub async fn send_reset_link(&self, to: &str, username: &str, link: &str, ttl_minutes: i64) -> Result<()> {
        let email = Email {
            from: self.from.clone(),
            to: to.to_string(),
            subject: format!("{} - Reset Password Link", self.app_name),
            text: format!(
                "Hello {},\n\nUse the link below to choose a new password:\n{link}\n\nThe link expires in {ttl_minutes} minutes.\n",
                username.to_uppercase()
            ),
        };
        self.mailer.send(email).await
    }
}
