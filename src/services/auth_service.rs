use crate::domain::auth::Password;
use crate::domain::auth_session::AuthSession;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::token_service::{IssuedToken, TokenService};
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of access tokens minted from a refresh token")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of successful logout attempts")
                .build(),
        }
    }
}

/// How a session was opened; recorded on the login counter.
#[derive(Debug, Clone, Copy)]
pub enum LoginMethod {
    Password,
    Google,
}

impl LoginMethod {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Google => "google",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthService {
    pool: DbPool,
    user_repo: UserRepository,
    tokens: TokenService,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(pool: DbPool, user_repo: UserRepository, tokens: TokenService) -> Self {
        Self { pool, user_repo, tokens, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password)).await.map_err(|_| AppError::Internal)?
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash is unreadable.
    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// Mints an access/refresh pair for an already authenticated user.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub fn create_session(&self, user_id: Uuid, method: LoginMethod) -> Result<AuthSession> {
        let access = self.tokens.issue_access_token(user_id).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::Internal
        })?;
        let refresh = self.tokens.issue_refresh_token(user_id).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign refresh token");
            AppError::Internal
        })?;

        self.metrics.login_total.add(1, &[KeyValue::new("method", method.as_str())]);

        Ok(AuthSession {
            user_id,
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
        })
    }

    /// Exchanges a refresh token for a new access token. The refresh token
    /// itself is left untouched and stays valid until it expires.
    ///
    /// # Errors
    /// Returns `AppError::Token` for an expired or invalid refresh token and
    /// `AppError::AuthError` if its user no longer exists.
    #[tracing::instrument(err(level = "warn"), skip(self, refresh_token), fields(user_id = tracing::field::Empty))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken> {
        let claims = self.tokens.verify_refresh_token(refresh_token)?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.user_id));

        if self.user_repo.find_by_id(&self.pool, claims.user_id).await?.is_none() {
            tracing::warn!("Refresh token refers to a deleted user");
            return Err(AppError::AuthError);
        }

        let access = self.tokens.issue_access_token(claims.user_id).map_err(|_| AppError::Internal)?;
        self.metrics.refresh_total.add(1, &[]);
        tracing::debug!("Access token refreshed");
        Ok(access)
    }

    /// Resolves a bearer access token to its user.
    ///
    /// # Errors
    /// Returns `AppError::Token` for an expired or invalid token and
    /// `AppError::AuthError` if the user no longer exists.
    pub async fn authenticate(&self, access_token: &str) -> Result<User> {
        let claims = self.tokens.verify_access_token(access_token)?;
        self.user_repo.find_by_id(&self.pool, claims.user_id).await?.ok_or(AppError::AuthError)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub fn logout(&self, user_id: Uuid) {
        self.metrics.logout_total.add(1, &[]);
        tracing::info!("User logged out");
    }
}
