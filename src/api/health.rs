use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Ready once the database answers and is migrated. Optional integrations are reported only.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let health = &state.health_service;
    let (status_code, status) = match health.check_db().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, component = "database", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let response = HealthResponse { status, database: status, integrations: health.integrations() };
    (status_code, Json(response))
}
