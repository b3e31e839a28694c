use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Payload carried by both access and refresh tokens.
///
/// Only the identity travels in the token; profile data is re-read from the
/// database on every verified request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn new(user_id: Uuid, issued_at: i64, ttl_secs: i64) -> Self {
        Self { user_id, iat: issued_at, exp: issued_at + ttl_secs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Why a presented token was rejected. Callers use the distinction to decide
/// between refreshing and forcing a new login.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or signature invalid")]
    Malformed,
}

#[derive(Debug)]
pub struct Password;

impl Password {
    #[tracing::instrument(skip(password), level = "debug")]
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal)?.to_string();
        Ok(password_hash)
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }
}

/// Six-digit code emailed for address verification.
#[derive(Debug)]
pub struct OneTimeCode;

impl OneTimeCode {
    pub const MIN: u32 = 100_000;
    pub const MAX: u32 = 999_999;

    #[must_use]
    pub fn generate() -> u32 {
        OsRng.gen_range(Self::MIN..=Self::MAX)
    }
}

/// Random secret handed out once (reset links) and stored only as a digest.
#[derive(Debug)]
pub struct OpaqueToken;

impl OpaqueToken {
    /// 30 random bytes, hex encoded.
    #[must_use]
    pub fn generate() -> String {
        let mut bytes = [0u8; 30];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Hashes a token using SHA-256 for secure storage.
    #[must_use]
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// CSRF state for the OAuth authorization round trip.
#[derive(Debug)]
pub struct OAuthState;

impl OAuthState {
    #[must_use]
    pub fn generate() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_expiry() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, 1_000, 900);
        assert_eq!(claims.exp, 1_900);
        assert_eq!(claims.user_id, user_id);
    }

    #[test]
    fn test_claims_serialize_user_id() {
        let claims = Claims::new(Uuid::nil(), 0, 1);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("userId").is_some());
    }

    #[test]
    fn test_password_hashing() {
        let password = "password12345";
        let hash = Password::hash(password).unwrap();

        assert!(Password::verify(password, &hash).unwrap());
        assert!(!Password::verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_one_time_code_range() {
        for _ in 0..100 {
            let code = OneTimeCode::generate();
            assert!((OneTimeCode::MIN..=OneTimeCode::MAX).contains(&code));
        }
    }

    #[test]
    fn test_opaque_token_generation() {
        let token1 = OpaqueToken::generate();
        let token2 = OpaqueToken::generate();

        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 60);
    }

    #[test]
    fn test_opaque_token_hashing() {
        let token = "my_token";
        let hash1 = OpaqueToken::hash(token);
        let hash2 = OpaqueToken::hash(token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
    }

    #[test]
    fn test_oauth_state_length() {
        assert_eq!(OAuthState::generate().len(), 43);
    }
}
