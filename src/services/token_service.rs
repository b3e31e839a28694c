use crate::config::AuthConfig;
use crate::domain::auth::{Claims, TokenError, TokenKind};
use anyhow::{Context, bail};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// A freshly signed token and its absolute expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

/// Signs and verifies the two token kinds. Access and refresh tokens share a
/// claim layout but never a secret, so one cannot stand in for the other.
#[derive(Clone)]
pub struct TokenService {
    inner: std::sync::Arc<Inner>,
}

struct Inner {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.inner.access.ttl_secs)
            .field("refresh_ttl_secs", &self.inner.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// # Errors
    /// Fails when a secret is empty, both secrets are equal, or a lifetime is not positive.
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        if config.access_token_secret.is_empty() || config.refresh_token_secret.is_empty() {
            bail!("token secrets must not be empty");
        }
        if config.access_token_secret == config.refresh_token_secret {
            bail!("access and refresh token secrets must differ");
        }

        let access_ttl = i64::try_from(config.access_token_ttl_secs).context("access token ttl out of range")?;
        let refresh_ttl = config
            .refresh_token_ttl_days
            .checked_mul(86_400)
            .context("refresh token ttl out of range")?;
        if access_ttl <= 0 || refresh_ttl <= 0 {
            bail!("token lifetimes must be positive");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            inner: std::sync::Arc::new(Inner {
                access: KeyPair {
                    encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
                    decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
                    ttl_secs: access_ttl,
                },
                refresh: KeyPair {
                    encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
                    decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
                    ttl_secs: refresh_ttl,
                },
                validation,
            }),
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.inner.access,
            TokenKind::Refresh => &self.inner.refresh,
        }
    }

    #[must_use]
    pub fn ttl_secs(&self, kind: TokenKind) -> i64 {
        self.keys(kind).ttl_secs
    }

    /// Signs a token of `kind` for `user_id` as if issued at `issued_at` (unix seconds).
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_at(&self, kind: TokenKind, user_id: Uuid, issued_at: i64) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let keys = self.keys(kind);
        let claims = Claims::new(user_id, issued_at, keys.ttl_secs);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        Ok(IssuedToken { token, expires_at: claims.exp })
    }

    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue_at(TokenKind::Access, user_id, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue_at(TokenKind::Refresh, user_id, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// # Errors
    /// `TokenError::Expired` once `exp` has passed, `TokenError::Malformed` otherwise.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// # Errors
    /// See [`TokenService::verify`].
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Access, token)
    }

    /// # Errors
    /// See [`TokenService::verify`].
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Refresh, token)
    }
}
