use crate::api::cookies::REFRESH_COOKIE;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The access token a request was sent with, tagged with the store generation
/// it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub token: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Tokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
    generation: u64,
}

/// Holds the tokens of one browser-equivalent session.
///
/// Every change to the access token bumps `generation`, which lets the refresh
/// coordinator tell a stale 401 from a fresh one.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<Tokens>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tokens(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self { tokens: RwLock::new(Tokens { access_token, refresh_token, generation: 0 }) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn access(&self) -> AccessSnapshot {
        let tokens = self.read();
        AccessSnapshot { token: tokens.access_token.clone(), generation: tokens.generation }
    }

    /// Replaces the access token and returns the new generation.
    pub fn set_access_token(&self, token: String) -> u64 {
        let mut tokens = self.write();
        tokens.access_token = Some(token);
        tokens.generation += 1;
        tokens.generation
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn set_refresh_token(&self, token: Option<String>) {
        self.write().refresh_token = token;
    }

    /// Forgets both tokens.
    pub fn clear(&self) {
        let mut tokens = self.write();
        tokens.access_token = None;
        tokens.refresh_token = None;
        tokens.generation += 1;
    }

    /// `Cookie` header value carrying the refresh token, for requests made
    /// outside a browser cookie jar.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        self.read().refresh_token.as_ref().map(|t| format!("{REFRESH_COOKIE}={t}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_advances_on_every_change() {
        let store = SessionStore::with_tokens(Some("a".into()), Some("r".into()));
        assert_eq!(store.access(), AccessSnapshot { token: Some("a".into()), generation: 0 });

        assert_eq!(store.set_access_token("b".into()), 1);
        assert_eq!(store.access().token.as_deref(), Some("b"));

        store.clear();
        let snapshot = store.access();
        assert_eq!(snapshot.token, None);
        assert_eq!(snapshot.generation, 2);
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_cookie_header() {
        let store = SessionStore::new();
        assert_eq!(store.cookie_header(), None);

        store.set_refresh_token(Some("xyz".into()));
        assert_eq!(store.cookie_header().as_deref(), Some("refreshToken=xyz"));
    }
}
