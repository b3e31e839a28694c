use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Local,
    Google,
}

impl AuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "google" => Ok(Self::Google),
            other => Err(format!("unknown auth provider: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub(crate) password_hash: Option<String>,
    pub is_verified: bool,
    pub(crate) otp_hash: Option<String>,
    pub(crate) otp_expires_at: Option<OffsetDateTime>,
    pub(crate) reset_token_expires_at: Option<OffsetDateTime>,
    pub providers: Vec<AuthProvider>,
    pub google_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn has_provider(&self, provider: AuthProvider) -> bool {
        self.providers.contains(&provider)
    }

    #[must_use]
    pub fn otp_expired(&self, now: OffsetDateTime) -> bool {
        self.otp_expires_at.is_none_or(|at| now > at)
    }

    #[must_use]
    pub fn reset_token_expired(&self, now: OffsetDateTime) -> bool {
        self.reset_token_expires_at.is_none_or(|at| now > at)
    }
}

/// Emails are matched case-insensitively and without surrounding whitespace.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: None,
            is_verified: false,
            otp_hash: None,
            otp_expires_at: None,
            reset_token_expires_at: None,
            providers: vec![AuthProvider::Local],
            google_id: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_provider_roundtrip() {
        for provider in [AuthProvider::Local, AuthProvider::Google] {
            assert_eq!(provider.as_str().parse::<AuthProvider>().unwrap(), provider);
        }
        assert!("github".parse::<AuthProvider>().is_err());
    }

    #[test]
    fn test_otp_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut user = user();
        assert!(user.otp_expired(now), "missing expiry counts as expired");

        user.otp_expires_at = Some(now + Duration::minutes(10));
        assert!(!user.otp_expired(now));
        assert!(user.otp_expired(now + Duration::minutes(11)));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
