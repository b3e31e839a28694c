use crate::api::cookies::{ACCESS_COOKIE, CookiePolicy, REFRESH_COOKIE};
use crate::session::ClientError;
use crate::session::coordinator::TokenExchange;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use reqwest::StatusCode;
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

pub const PROTECTED_PREFIX: &str = "/dashboard";
pub const AUTH_PAGES_PREFIX: &str = "/auth";
pub const LOGIN_PAGE: &str = "/auth/login";
pub const HOME_PAGE: &str = "/";

const VERIFY_PATH: &str = "/api/auth/verify-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// `true` when `path` is `prefix` itself or lies below it.
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_guarded(path: &str) -> bool {
    under(path, PROTECTED_PREFIX) || under(path, AUTH_PAGES_PREFIX)
}

/// Where a page navigation should go given the session state.
#[must_use]
pub fn decide(path: &str, is_authenticated: bool) -> GuardDecision {
    if under(path, PROTECTED_PREFIX) && !is_authenticated {
        GuardDecision::Redirect(LOGIN_PAGE)
    } else if under(path, AUTH_PAGES_PREFIX) && is_authenticated {
        GuardDecision::Redirect(HOME_PAGE)
    } else {
        GuardDecision::Allow
    }
}

/// Asks the API whether an access token is still good.
#[async_trait]
pub trait TokenCheck: Send + Sync + Debug {
    async fn is_valid(&self, access_token: &str) -> Result<bool, ClientError>;
}

/// Calls `GET /api/auth/verify-token` with the token as a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpTokenCheck {
    http: reqwest::Client,
    verify_url: Url,
}

impl HttpTokenCheck {
    /// # Errors
    /// Returns an error if the verify URL cannot be derived from `base_url`.
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, ClientError> {
        let verify_url =
            base_url.join(VERIFY_PATH).map_err(|e| ClientError::Network(format!("invalid url {VERIFY_PATH}: {e}")))?;
        Ok(Self { http, verify_url })
    }
}

#[async_trait]
impl TokenCheck for HttpTokenCheck {
    async fn is_valid(&self, access_token: &str) -> Result<bool, ClientError> {
        let response = self.http.get(self.verify_url.clone()).bearer_auth(access_token).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => Ok(false),
            status => Err(ClientError::Status { status: status.as_u16(), body: response.text().await.unwrap_or_default() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// `refreshed` carries the access token minted during the probe, if any.
    Authenticated { refreshed: Option<String> },
    Anonymous,
}

impl ProbeOutcome {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Single-shot session check for page navigations: verify, refresh once,
/// verify again. Never queues behind other requests.
#[derive(Debug, Clone)]
pub struct SessionProbe {
    check: Arc<dyn TokenCheck>,
    exchange: Arc<dyn TokenExchange>,
}

impl SessionProbe {
    #[must_use]
    pub fn new(check: Arc<dyn TokenCheck>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self { check, exchange }
    }

    async fn verify(&self, access_token: &str) -> bool {
        match self.check.is_valid(access_token).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Access token check failed");
                false
            }
        }
    }

    pub async fn is_authenticated(&self, access_token: Option<&str>, refresh_token: Option<&str>) -> ProbeOutcome {
        if let Some(access) = access_token.filter(|t| !t.is_empty())
            && self.verify(access).await
        {
            return ProbeOutcome::Authenticated { refreshed: None };
        }

        let Some(refresh) = refresh_token.filter(|t| !t.is_empty()) else {
            return ProbeOutcome::Anonymous;
        };

        match self.exchange.exchange(refresh).await {
            Ok(token) if self.verify(&token).await => ProbeOutcome::Authenticated { refreshed: Some(token) },
            Ok(_) => ProbeOutcome::Anonymous,
            Err(e) => {
                tracing::debug!(error = %e, "Session could not be refreshed");
                ProbeOutcome::Anonymous
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardState {
    pub probe: SessionProbe,
    pub cookie_policy: CookiePolicy,
    pub access_ttl_secs: i64,
}

/// Gates page navigations. Paths outside `/dashboard` and `/auth` pass through
/// without a probe.
pub async fn route_guard(State(guard): State<GuardState>, jar: CookieJar, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if !is_guarded(&path) {
        return next.run(request).await;
    }

    let outcome = guard
        .probe
        .is_authenticated(jar.get(ACCESS_COOKIE).map(|c| c.value()), jar.get(REFRESH_COOKIE).map(|c| c.value()))
        .await;

    let jar = match &outcome {
        ProbeOutcome::Authenticated { refreshed: Some(token) } => {
            jar.add(guard.cookie_policy.access_cookie(token.clone(), guard.access_ttl_secs))
        }
        _ => jar,
    };

    match decide(&path, outcome.is_authenticated()) {
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %path, target = %target, "Navigation redirected");
            (jar, Redirect::to(target)).into_response()
        }
        GuardDecision::Allow => (jar, next.run(request).await).into_response(),
    }
}
