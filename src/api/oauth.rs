use crate::api::AppState;
use crate::api::cookies::OAUTH_STATE_COOKIE;
use crate::api::schemas::auth::GoogleCallback;
use crate::domain::auth::{OAuthState, TokenKind};
use crate::error::Result;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde_json::json;

const FAILURE_PATH: &str = "/api/auth/google/failure";

/// Starts the Google round trip: remembers a random `state` in a cookie and
/// redirects to the consent screen.
pub async fn google(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let csrf_state = OAuthState::generate();
    let url = state.oauth_service.authorization_url(&csrf_state)?;
    let jar = jar.add(state.cookie_policy.oauth_state_cookie(csrf_state));
    Ok((jar, Redirect::to(&url)))
}

pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<GoogleCallback>,
) -> Response {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(state.cookie_policy.clear_oauth_state_cookie());

    if let Some(error) = &params.error {
        tracing::warn!(error = %error, "Google sign-in was declined");
        return (jar, Redirect::to(FAILURE_PATH)).into_response();
    }

    let (Some(code), Some(returned)) = (params.code.as_deref(), params.state.as_deref()) else {
        tracing::warn!("Google callback without code or state");
        return (jar, Redirect::to(FAILURE_PATH)).into_response();
    };

    if expected.as_deref().is_none_or(|e| e.is_empty() || e != returned) {
        tracing::warn!("Google callback state mismatch");
        return (jar, Redirect::to(FAILURE_PATH)).into_response();
    }

    match state.oauth_service.complete_login(code).await {
        Ok(session) => {
            let max_age = state.auth_service.tokens().ttl_secs(TokenKind::Refresh);
            let jar = jar.add(state.cookie_policy.refresh_cookie(session.refresh_token, max_age));
            let target = format!(
                "{}/auth/google/success?token={}",
                state.config.client.client_domain.trim_end_matches('/'),
                session.access_token
            );
            tracing::info!(user_id = %session.user_id, "Google sign-in completed");
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            (jar, Redirect::to(FAILURE_PATH)).into_response()
        }
    }
}

pub async fn google_failure() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Google authentication failed." })))
}
