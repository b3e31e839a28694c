use crate::api::cookies::CookiePolicy;
use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::auth_service::AuthService;
use crate::services::health_service::HealthService;
use crate::services::oauth_service::OAuthService;
use crate::services::resume_service::ResumeService;
use crate::storage::DbPool;
use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod cookies;
pub mod health;
pub mod middleware;
pub mod oauth;
pub mod rate_limit;
pub mod resumes;
pub mod schemas;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub cookie_policy: CookiePolicy,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub oauth_service: OAuthService,
    pub resume_service: ResumeService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub pool: DbPool,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub oauth_service: OAuthService,
    pub resume_service: ResumeService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: Config, services: ServiceContainer) -> Router {
    let std_interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(config.rate_limit.burst.max(1))
            .finish()
            .expect("Failed to build standard rate limiter config"),
    );

    // Credential endpoints hash passwords and send mail; they get a stricter limit.
    let auth_interval_ns = 1_000_000_000 / config.rate_limit.auth_per_second.max(1);
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(auth_interval_ns))
            .burst_size(config.rate_limit.auth_burst.max(1))
            .finish()
            .expect("Failed to build auth rate limiter config"),
    );

    let state = AppState {
        cookie_policy: CookiePolicy::from_config(&config.cookies),
        config,
        auth_service: services.auth_service,
        account_service: services.account_service,
        oauth_service: services.oauth_service,
        resume_service: services.resume_service,
    };

    let credential_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email/{userId}", post(auth::verify_email))
        .route("/auth/resend-otp/{userId}", get(auth::resend_otp))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password/{token}", post(auth::reset_password))
        .layer(GovernorLayer::new(auth_conf));

    let api_routes = Router::new()
        .route("/auth/verify-reset-password-token/{token}", get(auth::verify_reset_password_token))
        .route("/auth/profile-data", get(auth::profile_data))
        .route("/auth/refresh", get(auth::refresh))
        .route("/auth/verify-token", get(auth::verify_token))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/google", get(oauth::google))
        .route("/auth/google/callback", get(oauth::google_callback))
        .route("/auth/google/failure", get(oauth::google_failure))
        .route("/resume/create", post(resumes::create))
        .route("/resume/upload", post(resumes::upload))
        .route("/resume/all", get(resumes::list))
        .route("/resume/enhance-text", post(resumes::enhance_text))
        .route("/resume/public/{resumeId}", get(resumes::public))
        .route(
            "/resume/{resumeId}",
            get(resumes::get_one).put(resumes::update).delete(resumes::delete),
        )
        .layer(GovernorLayer::new(standard_conf));

    Router::new()
        .nest("/api", credential_routes.merge(api_routes))
        .layer(from_fn_with_state(rate_limit::Metrics::new(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), middleware::MakeRequestUuidV7))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
