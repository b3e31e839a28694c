use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::MessageResponse;
use crate::api::schemas::resume::{
    CreateResume, CreatedResumeResponse, EnhanceText, EnhanceTextResponse, ResumeRef, ResumeResponse, ResumesResponse,
    UpdateResume, UploadResume,
};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

pub async fn create(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateResume>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resume = state.resume_service.create(auth_user.user.id, &payload.title).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResumeResponse {
            message: format!("\"{}\" created successfully.", resume.title.to_uppercase()),
            resume: ResumeRef { id: resume.id },
        }),
    ))
}

pub async fn upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UploadResume>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resume = state.resume_service.upload(auth_user.user.id, &payload.title, &payload.resume_text).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResumeResponse {
            message: format!("\"{}\" created successfully.", resume.title.to_uppercase()),
            resume: ResumeRef { id: resume.id },
        }),
    ))
}

pub async fn list(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resumes = state.resume_service.list(auth_user.user.id).await?;
    Ok(Json(ResumesResponse { resumes: resumes.into_iter().map(Into::into).collect() }))
}

pub async fn get_one(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let resume = state.resume_service.get(auth_user.user.id, resume_id).await?;
    Ok(Json(ResumeResponse { resume: resume.into() }))
}

pub async fn update(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(payload): Json<UpdateResume>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resume = state.resume_service.update(auth_user.user.id, resume_id, payload.into()).await?;
    Ok(Json(ResumeResponse { resume: resume.into() }))
}

pub async fn delete(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let resume = state.resume_service.delete(auth_user.user.id, resume_id).await?;
    Ok(Json(MessageResponse::new(format!("\"{}\" deleted successfully.", resume.title.to_uppercase()))))
}

/// Shared view of a resume; no authentication.
pub async fn public(State(state): State<AppState>, Path(resume_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let resume = state.resume_service.public(resume_id).await?;
    Ok(Json(ResumeResponse { resume: resume.into() }))
}

pub async fn enhance_text(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EnhanceText>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let enhanced_text = state.resume_service.enhance(payload.kind, &payload.text).await?;
    Ok(Json(EnhanceTextResponse { enhanced_text }))
}
