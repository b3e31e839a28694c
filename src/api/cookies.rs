use crate::config::CookieConfig;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const OAUTH_STATE_COOKIE: &str = "oauthState";

const OAUTH_STATE_PATH: &str = "/api/auth/google";
const OAUTH_STATE_TTL_SECS: i64 = 600;

/// Cookie attributes for the current deployment.
///
/// Production runs the client and the API on different sites, so the refresh
/// cookie must be `Secure; SameSite=None` there. Development uses `Lax` over
/// plain HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    secure: bool,
    same_site: SameSite,
}

impl CookiePolicy {
    #[must_use]
    pub fn from_config(config: &CookieConfig) -> Self {
        if config.is_production() {
            Self { secure: true, same_site: SameSite::None }
        } else {
            Self { secure: false, same_site: SameSite::Lax }
        }
    }

    /// The long-lived refresh cookie. Never readable by scripts.
    #[must_use]
    pub fn refresh_cookie(self, token: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, token))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(Duration::seconds(max_age_secs))
            .build()
    }

    /// Same attributes as [`CookiePolicy::refresh_cookie`] so the browser overwrites it.
    #[must_use]
    pub fn clear_refresh_cookie(self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }

    /// The access cookie read by the page tier; intentionally not `HttpOnly`.
    #[must_use]
    pub fn access_cookie(self, token: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((ACCESS_COOKIE, token))
            .http_only(false)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(Duration::seconds(max_age_secs))
            .build()
    }

    #[must_use]
    pub fn clear_access_cookie(self) -> Cookie<'static> {
        Cookie::build((ACCESS_COOKIE, ""))
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }

    /// CSRF state for the Google round trip. `Lax` so it survives the
    /// top-level redirect back from the provider.
    #[must_use]
    pub fn oauth_state_cookie(self, state: String) -> Cookie<'static> {
        Cookie::build((OAUTH_STATE_COOKIE, state))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(OAUTH_STATE_PATH)
            .max_age(Duration::seconds(OAUTH_STATE_TTL_SECS))
            .build()
    }

    #[must_use]
    pub fn clear_oauth_state_cookie(self) -> Cookie<'static> {
        Cookie::build((OAUTH_STATE_COOKIE, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(OAUTH_STATE_PATH)
            .max_age(Duration::ZERO)
            .build()
    }
}
