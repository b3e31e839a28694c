use crate::domain::resume::{Resume, ResumeContent, Template};
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const RESUME_COLUMNS: &str =
    "id, user_id, title, public, template, accent_color, content, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ResumeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub public: bool,
    pub template: String,
    pub accent_color: String,
    pub content: Json<ResumeContent>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ResumeRecord> for Resume {
    fn from(record: ResumeRecord) -> Self {
        let template = record.template.parse::<Template>().unwrap_or_else(|e| {
            tracing::warn!(resume_id = %record.id, error = %e, "Falling back to default template");
            Template::default()
        });

        Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            public: record.public,
            template,
            accent_color: record.accent_color,
            content: record.content.0,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
