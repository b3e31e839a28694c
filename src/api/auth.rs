use crate::api::AppState;
use crate::api::middleware::{AuthUser, bearer_token};
use crate::api::schemas::auth::{
    AccessTokenResponse, ForgotPassword, Login, MessageResponse, ProfileResponse, ProfileUser, Registration,
    RegistrationResponse, ResetPassword, ResetTokenStatusResponse, UserRef, VerifyEmail, VerifyTokenResponse,
};
use crate::api::cookies::REFRESH_COOKIE;
use crate::domain::auth::TokenKind;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;
use validator::Validate;

pub async fn register(State(state): State<AppState>, Json(payload): Json<Registration>) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.account_service.register(&payload.username, &payload.email, &payload.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "We sent a verification email. Please check your inbox.".into(),
            user: UserRef { id: user.id },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Login>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.account_service.login(&payload.email, &payload.password).await?;

    let max_age = state.auth_service.tokens().ttl_secs(TokenKind::Refresh);
    let jar = jar.add(state.cookie_policy.refresh_cookie(session.refresh_token, max_age));

    Ok((jar, Json(AccessTokenResponse { access_token: session.access_token, expires_at: session.expires_at })))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<VerifyEmail>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if !payload.otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("OTP must be 6 digits".into()));
    }

    state.account_service.verify_email(user_id, &payload.otp).await?;
    Ok(Json(MessageResponse::new("Your email is verified successfully, please login.")))
}

pub async fn resend_otp(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<impl IntoResponse> {
    state.account_service.resend_otp(user_id).await?;
    Ok(Json(MessageResponse::new("We sent a new OTP code, please check your inbox.")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPassword>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.account_service.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::new("We sent a reset password link to your email, please check your inbox.")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPassword>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.account_service.reset_password(&token, &payload.password).await?;
    Ok(Json(MessageResponse::new("Your password is updated successfully. Please login.")))
}

pub async fn verify_reset_password_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let status = state.account_service.verify_reset_token(&token).await?;
    Ok(Json(ResetTokenStatusResponse { is_verified: status.is_verified, is_expired: status.is_expired }))
}

pub async fn profile_data(auth_user: AuthUser) -> impl IntoResponse {
    let user = auth_user.user;
    Json(ProfileResponse { user: ProfileUser { id: user.id, username: user.username, email: user.email } })
}

/// Mints a new access token from the refresh cookie. The cookie itself is not rotated.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing refresh token.".into()))?;

    let issued = state.auth_service.refresh(&refresh_token).await?;
    Ok(Json(AccessTokenResponse { access_token: issued.token, expires_at: issued.expires_at }))
}

/// Reports whether the bearer token is usable. Always answers with a
/// `{isAuthenticated, message}` body rather than the error envelope.
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyTokenResponse { is_authenticated: false, message: "No access token provided.".into() }),
        );
    };

    match state.auth_service.authenticate(token).await {
        Ok(_) => (StatusCode::OK, Json(VerifyTokenResponse { is_authenticated: true, message: "Valid token.".into() })),
        Err(AppError::Token(_) | AppError::AuthError) => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyTokenResponse { is_authenticated: false, message: "Invalid or expired token.".into() }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Token verification failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyTokenResponse { is_authenticated: false, message: "Internal server error".into() }),
            )
        }
    }
}

/// Requires both a valid bearer token and the refresh cookie; clears the cookie.
pub async fn logout(auth_user: AuthUser, State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    if jar.get(REFRESH_COOKIE).is_none_or(|c| c.value().is_empty()) {
        return Err(AppError::BadRequest("No token provided.".into()));
    }

    state.auth_service.logout(auth_user.user.id);
    let jar = jar.add(state.cookie_policy.clear_refresh_cookie()).add(state.cookie_policy.clear_access_cookie());
    Ok((jar, Json(MessageResponse::new("You are logged out."))))
}
