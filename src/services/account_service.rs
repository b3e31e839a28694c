use crate::config::{AuthConfig, ClientConfig};
use crate::domain::auth::{OneTimeCode, OpaqueToken};
use crate::domain::auth_session::AuthSession;
use crate::domain::user::{User, normalize_email};
use crate::error::{AppError, Result};
use crate::services::auth_service::{AuthService, LoginMethod};
use crate::services::mail_service::MailService;
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{global, metrics::Counter};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct AccountMetrics {
    users_registered_total: Counter<u64>,
    emails_verified_total: Counter<u64>,
    password_resets_total: Counter<u64>,
}

impl AccountMetrics {
    fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            emails_verified_total: meter
                .u64_counter("users_verified_total")
                .with_description("Total number of confirmed email addresses")
                .build(),
            password_resets_total: meter
                .u64_counter("password_resets_total")
                .with_description("Total number of completed password resets")
                .build(),
        }
    }
}

/// Status of a password reset link as reported to the reset page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTokenStatus {
    pub is_verified: bool,
    pub is_expired: bool,
}

/// Registration, email verification and password recovery.
#[derive(Clone, Debug)]
pub struct AccountService {
    pool: DbPool,
    user_repo: UserRepository,
    auth_service: AuthService,
    mail: MailService,
    otp_ttl: Duration,
    reset_ttl: Duration,
    client_domain: String,
    metrics: AccountMetrics,
}

impl AccountService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        user_repo: UserRepository,
        auth_service: AuthService,
        mail: MailService,
        auth_config: &AuthConfig,
        client_config: &ClientConfig,
    ) -> Self {
        Self {
            pool,
            user_repo,
            auth_service,
            mail,
            otp_ttl: Duration::seconds(auth_config.otp_ttl_secs),
            reset_ttl: Duration::seconds(auth_config.reset_token_ttl_secs),
            client_domain: client_config.client_domain.trim_end_matches('/').to_string(),
            metrics: AccountMetrics::new(),
        }
    }

    /// Creates an unverified password account and emails its first verification code.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the email is already registered.
    #[tracing::instrument(
        skip(self, username, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        if self.user_repo.find_by_email(&self.pool, &email).await?.is_some() {
            return Err(AppError::Conflict("Your email already exists. Please login to your account.".into()));
        }

        let password_hash = self.auth_service.hash_password(password).await?;
        let user = self.user_repo.create_local(&self.pool, username.trim(), &email, &password_hash).await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        tracing::info!("User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        self.send_verification_code(&user).await?;
        Ok(user)
    }

    /// Replaces the user's pending code with a fresh one and emails it.
    async fn send_verification_code(&self, user: &User) -> Result<()> {
        let code = OneTimeCode::generate();
        let code_hash = self.auth_service.hash_password(&code.to_string()).await?;
        let expires_at = OffsetDateTime::now_utc() + self.otp_ttl;

        self.user_repo.set_otp(&self.pool, user.id, &code_hash, expires_at).await?;
        self.mail.send_otp(&user.email, &user.username, code, self.otp_ttl.whole_minutes()).await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User> {
        self.user_repo.find_by_id(&self.pool, user_id).await?.ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Confirms the user's email with the emailed code.
    ///
    /// A missing or expired code triggers a new one before the request is rejected.
    ///
    /// # Errors
    /// `Forbidden` when no code is pending, `BadRequest` when the code is expired or wrong.
    #[tracing::instrument(skip(self, otp), fields(user_id = %user_id), err(level = "warn"))]
    pub async fn verify_email(&self, user_id: Uuid, otp: &str) -> Result<()> {
        let user = self.find_user(user_id).await?;
        if user.is_verified {
            return Err(AppError::Forbidden("Your account is already verified.".into()));
        }

        let Some(otp_hash) = user.otp_hash.clone() else {
            self.send_verification_code(&user).await?;
            return Err(AppError::Forbidden(
                "No verification code is pending. We sent a new one, please check your inbox.".into(),
            ));
        };

        if user.otp_expired(OffsetDateTime::now_utc()) {
            self.send_verification_code(&user).await?;
            return Err(AppError::BadRequest(
                "Your verification code has expired. We sent a new one, please check your inbox.".into(),
            ));
        }

        if !self.auth_service.verify_password(otp, &otp_hash).await? {
            return Err(AppError::BadRequest("Invalid OTP code.".into()));
        }

        self.user_repo.mark_verified(&self.pool, user.id).await?;
        self.metrics.emails_verified_total.add(1, &[]);
        tracing::info!("Email verified");
        Ok(())
    }

    /// # Errors
    /// `Forbidden` if the account is already verified.
    #[tracing::instrument(skip(self), fields(user_id = %user_id), err(level = "warn"))]
    pub async fn resend_otp(&self, user_id: Uuid) -> Result<()> {
        let user = self.find_user(user_id).await?;
        if user.is_verified {
            return Err(AppError::Forbidden("Your account is already verified.".into()));
        }
        self.send_verification_code(&user).await
    }

    /// Checks email and password and opens a session.
    ///
    /// # Errors
    /// `AuthError` for unknown emails, Google-only accounts and wrong passwords;
    /// `Forbidden` for unverified accounts, which also get a fresh code.
    #[tracing::instrument(
        skip(self, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let Some(user) = self.user_repo.find_by_email(&self.pool, &email).await? else {
            tracing::warn!("Login failed: user not found");
            return Err(AppError::AuthError);
        };
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let Some(password_hash) = user.password_hash.as_deref() else {
            tracing::warn!("Login failed: account has no password");
            return Err(AppError::AuthError);
        };

        if !self.auth_service.verify_password(password, password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::AuthError);
        }

        if !user.is_verified {
            self.send_verification_code(&user).await?;
            return Err(AppError::Forbidden(
                "Your account is not verified. We sent a new code, please check your inbox.".into(),
            ));
        }

        self.auth_service.create_session(user.id, LoginMethod::Password)
    }

    /// Emails a single-use password reset link.
    ///
    /// # Errors
    /// `NotFound` for unknown emails, `Forbidden` for unverified accounts.
    #[tracing::instrument(skip(self, email), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let Some(user) = self.user_repo.find_by_email(&self.pool, &email).await? else {
            return Err(AppError::NotFound("You do not have an account on our platform.".into()));
        };
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !user.is_verified {
            self.send_verification_code(&user).await?;
            return Err(AppError::Forbidden(
                "Your account is not verified. We sent a new code, please check your inbox.".into(),
            ));
        }

        self.send_reset_link(&user).await
    }

    async fn send_reset_link(&self, user: &User) -> Result<()> {
        let token = OpaqueToken::generate();
        let expires_at = OffsetDateTime::now_utc() + self.reset_ttl;
        self.user_repo.set_reset_token(&self.pool, user.id, &OpaqueToken::hash(&token), expires_at).await?;

        let link = format!("{}/auth/reset-password/{token}", self.client_domain);
        self.mail.send_reset_link(&user.email, &user.username, &link, self.reset_ttl.whole_minutes()).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    pub async fn verify_reset_token(&self, token: &str) -> Result<ResetTokenStatus> {
        let user = self.user_repo.find_by_reset_token_hash(&self.pool, &OpaqueToken::hash(token)).await?;
        Ok(match user {
            Some(user) => ResetTokenStatus {
                is_verified: true,
                is_expired: user.reset_token_expired(OffsetDateTime::now_utc()),
            },
            None => ResetTokenStatus { is_verified: false, is_expired: false },
        })
    }

    /// Sets a new password through a reset link and consumes the link.
    ///
    /// # Errors
    /// `BadRequest` for unknown links and for expired links, which are re-sent.
    #[tracing::instrument(skip(self, token, new_password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let Some(user) = self.user_repo.find_by_reset_token_hash(&self.pool, &OpaqueToken::hash(token)).await? else {
            return Err(AppError::BadRequest("Invalid token.".into()));
        };
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if user.reset_token_expired(OffsetDateTime::now_utc()) {
            self.send_reset_link(&user).await?;
            return Err(AppError::BadRequest(
                "Your reset link has expired. We sent a new one, please check your inbox.".into(),
            ));
        }

        let password_hash = self.auth_service.hash_password(new_password).await?;
        self.user_repo.update_password(&self.pool, user.id, &password_hash).await?;
        self.metrics.password_resets_total.add(1, &[]);
        tracing::info!("Password reset");
        Ok(())
    }
}
