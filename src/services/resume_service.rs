use crate::domain::resume::{EnhanceKind, Resume, ResumeContent, ResumePatch, is_hex_color};
use crate::error::{AppError, Result};
use crate::services::llm_client::{LlmError, TextModel, complete_json};
use crate::storage::DbPool;
use crate::storage::resume_repo::ResumeRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert AI agent that extracts data from resumes. \
     Always return valid JSON and preserve the original language of the resume content.";

const EXTRACTION_FORMAT: &str = r#"Provide the data as a single JSON object with no text before or after it, using exactly this shape:
{
  "personalInfo": { "fullName": string, "email": string, "phone": string, "location": string,
                    "linkedin": string | null, "website": string | null, "profession": string },
  "professionalSummary": string,
  "education": [{ "institution": string, "degree": string, "field": string, "graduationDate": string | null }],
  "experience": [{ "company": string, "position": string, "startDate": string | null, "endDate": string | null,
                   "description": string, "isCurrent": boolean }],
  "project": [{ "name": string, "type": string, "description": string }],
  "skills": [string]
}
Rules:
- If a position is current (Present, Ongoing, etc.) set "isCurrent": true and "endDate": null.
- If a position has ended set "isCurrent": false and provide "endDate".
- Never use "Present", "Current" or similar words as a date."#;

#[derive(Clone, Debug)]
struct Metrics {
    resumes_created_total: Counter<u64>,
    enhancements_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            resumes_created_total: meter
                .u64_counter("resumes_created_total")
                .with_description("Total number of resumes created, by source")
                .build(),
            enhancements_total: meter
                .u64_counter("resume_enhancements_total")
                .with_description("Total number of AI text enhancements, by section")
                .build(),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(e) => Self::Upstream(format!("model returned unusable JSON: {e}")),
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResumeService {
    pool: DbPool,
    repo: ResumeRepository,
    model: Arc<dyn TextModel>,
    metrics: Metrics,
}

impl ResumeService {
    #[must_use]
    pub fn new(pool: DbPool, repo: ResumeRepository, model: Arc<dyn TextModel>) -> Self {
        Self { pool, repo, model, metrics: Metrics::new() }
    }

    /// # Errors
    /// `Conflict` if the user already has a resume with this title.
    #[tracing::instrument(skip(self, title), fields(user_id = %user_id), err(level = "warn"))]
    pub async fn create(&self, user_id: Uuid, title: &str) -> Result<Resume> {
        let resume = self.repo.create(&self.pool, user_id, title.trim(), &ResumeContent::default()).await?;
        self.metrics.resumes_created_total.add(1, &[KeyValue::new("source", "blank")]);
        tracing::info!(resume_id = %resume.id, "Resume created");
        Ok(resume)
    }

    /// Asks the model to structure pasted resume text and stores the result as a new resume.
    ///
    /// # Errors
    /// `BadRequest` if the model could not find a name, `Upstream` if the model fails.
    #[tracing::instrument(skip(self, title, resume_text), fields(user_id = %user_id), err(level = "warn"))]
    pub async fn upload(&self, user_id: Uuid, title: &str, resume_text: &str) -> Result<Resume> {
        let prompt = format!("Extract data from this resume: {resume_text}\n\n{EXTRACTION_FORMAT}");
        let mut content: ResumeContent = complete_json(self.model.as_ref(), EXTRACTION_SYSTEM_PROMPT, &prompt).await?;

        if content.personal_info.full_name.trim().is_empty() {
            return Err(AppError::BadRequest("Could not extract essential information from resume.".into()));
        }
        content.normalize();

        let resume = self.repo.create(&self.pool, user_id, title.trim(), &content).await?;
        self.metrics.resumes_created_total.add(1, &[KeyValue::new("source", "upload")]);
        tracing::info!(resume_id = %resume.id, "Resume extracted from upload");
        Ok(resume)
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Resume>> {
        self.repo.list_by_user(&self.pool, user_id).await
    }

    /// Loads a resume and checks that `user_id` owns it.
    ///
    /// # Errors
    /// `NotFound` if it does not exist, `Forbidden` if someone else owns it.
    pub async fn get(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume> {
        let resume = self
            .repo
            .find_by_id(&self.pool, resume_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Resume not found.".into()))?;

        if resume.user_id != user_id {
            tracing::warn!(%user_id, %resume_id, "Resume access denied");
            return Err(AppError::Forbidden("You are not allowed to access this resume.".into()));
        }
        Ok(resume)
    }

    /// # Errors
    /// Ownership errors from [`ResumeService::get`], `BadRequest` for an invalid
    /// accent color or blank title, `Conflict` for a title clash.
    #[tracing::instrument(skip(self, patch), fields(user_id = %user_id, resume_id = %resume_id), err(level = "warn"))]
    pub async fn update(&self, user_id: Uuid, resume_id: Uuid, patch: ResumePatch) -> Result<Resume> {
        if patch.accent_color.as_deref().is_some_and(|c| !is_hex_color(c)) {
            return Err(AppError::BadRequest("Accent color must be a hex color such as #3B82F6.".into()));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AppError::BadRequest("Title cannot be empty.".into()));
        }

        let mut resume = self.get(user_id, resume_id).await?;
        patch.apply(&mut resume);
        resume.title = resume.title.trim().to_string();
        self.repo.update(&self.pool, &resume).await
    }

    /// # Errors
    /// Ownership errors from [`ResumeService::get`].
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn delete(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume> {
        let resume = self.get(user_id, resume_id).await?;
        if !self.repo.delete(&self.pool, resume.id, user_id).await? {
            return Err(AppError::NotFound("Resume not found.".into()));
        }
        tracing::info!("Resume deleted");
        Ok(resume)
    }

    /// A resume visible to anyone with its id. Private resumes are reported as missing.
    ///
    /// # Errors
    /// `NotFound` unless the resume exists and is public.
    pub async fn public(&self, resume_id: Uuid) -> Result<Resume> {
        self.repo
            .find_by_id(&self.pool, resume_id)
            .await?
            .filter(|r| r.public)
            .ok_or_else(|| AppError::NotFound("Resume not found.".into()))
    }

    /// # Errors
    /// `Upstream` if the model fails.
    #[tracing::instrument(skip(self, text), err(level = "warn"))]
    pub async fn enhance(&self, kind: EnhanceKind, text: &str) -> Result<String> {
        let enhanced = self.model.complete(kind.system_prompt(), &kind.user_prompt(text), false).await?;
        self.metrics.enhancements_total.add(1, &[KeyValue::new("kind", format!("{kind:?}"))]);
        Ok(enhanced.trim().to_string())
    }
}
