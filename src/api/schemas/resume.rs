use crate::domain::resume::{
    EnhanceKind, Education, Experience, PersonalInfoPatch, Project, Resume, ResumeContent, ResumePatch, Template,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateResume {
    #[validate(length(min = 1, max = 100, message = "Title is required"))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadResume {
    #[validate(length(min = 1, max = 100, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 50000, message = "Resume text is required"))]
    pub resume_text: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResume {
    #[validate(length(min = 1, max = 100, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub public: Option<bool>,
    pub template: Option<Template>,
    pub accent_color: Option<String>,
    pub personal_info: Option<PersonalInfoPatch>,
    pub professional_summary: Option<String>,
    pub education: Option<Vec<Education>>,
    pub experience: Option<Vec<Experience>>,
    pub project: Option<Vec<Project>>,
    pub skills: Option<Vec<String>>,
}

impl From<UpdateResume> for ResumePatch {
    fn from(body: UpdateResume) -> Self {
        Self {
            title: body.title,
            public: body.public,
            template: body.template,
            accent_color: body.accent_color,
            personal_info: body.personal_info,
            professional_summary: body.professional_summary,
            education: body.education,
            experience: body.experience,
            project: body.project,
            skills: body.skills,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnhanceText {
    #[serde(rename = "type")]
    pub kind: EnhanceKind,
    #[validate(length(min = 1, max = 5000, message = "Text is required"))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceTextResponse {
    pub enhanced_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub public: bool,
    pub template: Template,
    pub accent_color: String,
    #[serde(flatten)]
    pub content: ResumeContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Resume> for ResumeView {
    fn from(resume: Resume) -> Self {
        Self {
            id: resume.id,
            user_id: resume.user_id,
            title: resume.title,
            public: resume.public,
            template: resume.template,
            accent_color: resume.accent_color,
            content: resume.content,
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume: ResumeView,
}

#[derive(Debug, Serialize)]
pub struct ResumesResponse {
    pub resumes: Vec<ResumeView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResumeRef {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResumeResponse {
    pub message: String,
    pub resume: ResumeRef,
}
