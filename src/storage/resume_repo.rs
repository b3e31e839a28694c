use crate::domain::resume::{Resume, ResumeContent};
use crate::error::{AppError, Result};
use crate::storage::is_unique_violation;
use crate::storage::records::ResumeRecord;
use crate::storage::records::resume::RESUME_COLUMNS;
use sqlx::types::Json;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ResumeRepository {}

fn map_title_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("A resume with this title already exists".into())
    } else {
        AppError::Database(e)
    }
}

impl ResumeRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// # Errors
    /// Returns `AppError::Conflict` if the user already has a resume with this title.
    #[tracing::instrument(level = "debug", skip(self, executor, content), err)]
    pub(crate) async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        title: &str,
        content: &ResumeContent,
    ) -> Result<Resume>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO resumes (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING {RESUME_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ResumeRecord>(&sql)
            .bind(user_id)
            .bind(title)
            .bind(Json(content))
            .fetch_one(executor)
            .await
            .map(Into::into)
            .map_err(map_title_conflict)
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Resume>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1");
        let record = sqlx::query_as::<_, ResumeRecord>(&sql).bind(id).fetch_optional(executor).await?;
        Ok(record.map(Into::into))
    }

    /// Newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn list_by_user<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Resume>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 ORDER BY created_at DESC, id DESC");
        let records = sqlx::query_as::<_, ResumeRecord>(&sql).bind(user_id).fetch_all(executor).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Persists every mutable column of `resume` and returns the stored row.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` on a title clash and `AppError::NotFound`
    /// if the row vanished concurrently.
    #[tracing::instrument(level = "debug", skip(self, executor, resume), fields(resume_id = %resume.id), err)]
    pub(crate) async fn update<'e, E>(&self, executor: E, resume: &Resume) -> Result<Resume>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE resumes
            SET title = $3,
                public = $4,
                template = $5,
                accent_color = $6,
                content = $7,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {RESUME_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ResumeRecord>(&sql)
            .bind(resume.id)
            .bind(resume.user_id)
            .bind(&resume.title)
            .bind(resume.public)
            .bind(resume.template.as_str())
            .bind(&resume.accent_color)
            .bind(Json(&resume.content))
            .fetch_optional(executor)
            .await
            .map_err(map_title_conflict)?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound("Resume not found".into()))
    }

    /// Returns whether a row was removed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the delete fails.
    #[tracing::instrument(level = "debug", skip(self, executor), err)]
    pub(crate) async fn delete<'e, E>(&self, executor: E, id: Uuid, user_id: Uuid) -> Result<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
