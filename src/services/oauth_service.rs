use crate::config::GoogleConfig;
use crate::domain::auth_session::AuthSession;
use crate::domain::user::{User, normalize_email};
use crate::error::{AppError, Result};
use crate::services::auth_service::{AuthService, LoginMethod};
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use serde::Deserialize;
use url::Url;

/// Google OAuth client credentials and endpoints.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
}

impl GoogleClient {
    /// Returns `None` when Google sign-in is not configured.
    ///
    /// # Errors
    /// Fails if a configured URL does not parse.
    pub fn from_config(config: &GoogleConfig) -> anyhow::Result<Option<Self>> {
        let (Some(client_id), Some(client_secret), Some(callback)) =
            (&config.google_client_id, &config.google_client_secret, &config.google_callback_url)
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            redirect_uri: callback.parse()?,
            auth_url: config.google_auth_url.parse()?,
            token_url: config.google_token_url.parse()?,
            userinfo_url: config.google_userinfo_url.parse()?,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OAuthService {
    pool: DbPool,
    user_repo: UserRepository,
    auth_service: AuthService,
    http: reqwest::Client,
    google: Option<GoogleClient>,
}

impl OAuthService {
    #[must_use]
    pub const fn new(
        pool: DbPool,
        user_repo: UserRepository,
        auth_service: AuthService,
        http: reqwest::Client,
        google: Option<GoogleClient>,
    ) -> Self {
        Self { pool, user_repo, auth_service, http, google }
    }

    fn google(&self) -> Result<&GoogleClient> {
        self.google.as_ref().ok_or_else(|| AppError::NotFound("Google sign-in is not enabled".into()))
    }

    /// Builds the provider consent URL carrying `state`.
    ///
    /// # Errors
    /// `NotFound` when Google sign-in is not configured.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let google = self.google()?;
        let mut url = google.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &google.client_id)
            .append_pair("redirect_uri", google.redirect_uri.as_str())
            .append_pair("scope", "email profile")
            .append_pair("state", state);
        Ok(url.into())
    }

    /// # Errors
    /// `Upstream` if the token endpoint refuses the code.
    #[tracing::instrument(skip(self, code), err(level = "warn"))]
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let google = self.google()?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(google.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("token exchange failed: {e}")))?;
        let response = ensure_success(response, "token exchange").await?;
        let token: TokenResponse =
            response.json().await.map_err(|e| AppError::Upstream(format!("token exchange returned bad body: {e}")))?;
        Ok(token.access_token)
    }

    /// # Errors
    /// `Upstream` if the userinfo endpoint fails.
    #[tracing::instrument(skip(self, access_token), err(level = "warn"))]
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<GoogleUserInfo> {
        let google = self.google()?;
        let response = self
            .http
            .get(google.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("userinfo request failed: {e}")))?;
        let response = ensure_success(response, "userinfo request").await?;
        response.json().await.map_err(|e| AppError::Upstream(format!("userinfo returned bad body: {e}")))
    }

    /// Finds or creates the local account for a Google identity.
    ///
    /// Lookup order: Google id, then email (the identity is linked), then a new
    /// Google-only account.
    ///
    /// # Errors
    /// `Forbidden` when the provider did not supply a verified email.
    #[tracing::instrument(skip(self, info), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn resolve_account(&self, info: &GoogleUserInfo) -> Result<User> {
        if let Some(user) = self.user_repo.find_by_google_id(&self.pool, &info.sub).await? {
            tracing::Span::current().record("user_id", tracing::field::display(user.id));
            return Ok(user);
        }

        let email = match (&info.email, info.email_verified) {
            (Some(email), Some(true)) => normalize_email(email),
            _ => return Err(AppError::Forbidden("No verified email provided by Google.".into())),
        };

        if let Some(existing) = self.user_repo.find_by_email(&self.pool, &email).await? {
            let user = self.user_repo.link_google(&self.pool, existing.id, &info.sub).await?;
            tracing::Span::current().record("user_id", tracing::field::display(user.id));
            tracing::info!("Linked Google identity to existing account");
            return Ok(user);
        }

        let username = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| email.split('@').next().unwrap_or_default().to_string(), ToString::to_string);
        let user = self.user_repo.create_google(&self.pool, &username, &email, &info.sub).await?;
        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        tracing::info!("Created account from Google identity");
        Ok(user)
    }

    /// Full callback flow: code exchange, userinfo, account resolution, token pair.
    ///
    /// # Errors
    /// Any failure of the steps above.
    pub async fn complete_login(&self, code: &str) -> Result<AuthSession> {
        let provider_token = self.exchange_code(code).await?;
        let info = self.fetch_user_info(&provider_token).await?;
        let user = self.resolve_account(&info).await?;
        self.auth_service.create_session(user.id, LoginMethod::Google)
    }
}

async fn ensure_success(response: reqwest::Response, operation: &'static str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(operation, status = %status, body = %body, "OAuth provider returned an error");
    Err(AppError::Upstream(format!("{operation} failed with status {status}")))
}
