use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::is_unique_violation;
use crate::storage::records::UserRecord;
use crate::storage::records::user::USER_COLUMNS;
use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a password account that still has to confirm its email.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the email is already registered.
    #[tracing::instrument(level = "debug", skip(self, executor, password_hash), err)]
    pub(crate) async fn create_local<'e, E>(
        &self,
        executor: E,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, providers)
            VALUES ($1, $2, $3, ARRAY['local'])
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(executor)
            .await
            .map(Into::into)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("User already exists".into())
                } else {
                    AppError::Database(e)
                }
            })
    }

    /// Inserts an account backed only by Google. The provider has already
    /// verified the address, so the account starts verified.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the email or Google id is taken.
    #[tracing::instrument(level = "debug", skip(self, executor), err)]
    pub(crate) async fn create_google<'e, E>(
        &self,
        executor: E,
        username: &str,
        email: &str,
        google_id: &str,
    ) -> Result<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, google_id, is_verified, providers)
            VALUES ($1, $2, $3, TRUE, ARRAY['google'])
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .bind(email)
            .bind(google_id)
            .fetch_one(executor)
            .await
            .map(Into::into)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("User already exists".into())
                } else {
                    AppError::Database(e)
                }
            })
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql).bind(id).fetch_optional(executor).await?;
        Ok(record.map(Into::into))
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn find_by_email<'e, E>(&self, executor: E, email: &str) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql).bind(email).fetch_optional(executor).await?;
        Ok(record.map(Into::into))
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn find_by_google_id<'e, E>(&self, executor: E, google_id: &str) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql).bind(google_id).fetch_optional(executor).await?;
        Ok(record.map(Into::into))
    }

    /// Looks up the owner of a password reset link by the link's digest.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub(crate) async fn find_by_reset_token_hash<'e, E>(&self, executor: E, token_hash: &str) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token_hash = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql).bind(token_hash).fetch_optional(executor).await?;
        Ok(record.map(Into::into))
    }

    /// Replaces any pending verification code.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, executor, otp_hash), err)]
    pub(crate) async fn set_otp<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET otp_hash = $2, otp_expires_at = $3, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(otp_hash)
            .bind(expires_at)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, executor), err)]
    pub(crate) async fn mark_verified<'e, E>(&self, executor: E, user_id: Uuid) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, otp_hash = NULL, otp_expires_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, executor, token_hash), err)]
    pub(crate) async fn set_reset_token<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Stores a new password hash and consumes the reset link.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, executor, password_hash), err)]
    pub(crate) async fn update_password<'e, E>(&self, executor: E, user_id: Uuid, password_hash: &str) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Attaches a Google identity to an existing account.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the Google id already belongs to another user.
    #[tracing::instrument(level = "debug", skip(self, executor), err)]
    pub(crate) async fn link_google<'e, E>(&self, executor: E, user_id: Uuid, google_id: &str) -> Result<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE users
            SET google_id = $2,
                is_verified = TRUE,
                otp_hash = NULL,
                otp_expires_at = NULL,
                providers = CASE
                    WHEN 'google' = ANY(providers) THEN providers
                    ELSE array_append(providers, 'google')
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(google_id)
            .fetch_one(executor)
            .await
            .map(Into::into)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Google account already linked".into())
                } else {
                    AppError::Database(e)
                }
            })
    }

    /// Clears verification codes and reset links that expired before `cutoff`.
    /// Returns the number of rows touched.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    pub(crate) async fn clear_expired_verification<'e, E>(&self, executor: E, cutoff: OffsetDateTime) -> Result<u64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_hash = CASE WHEN otp_expires_at < $1 THEN NULL ELSE otp_hash END,
                otp_expires_at = CASE WHEN otp_expires_at < $1 THEN NULL ELSE otp_expires_at END,
                reset_token_hash = CASE WHEN reset_token_expires_at < $1 THEN NULL ELSE reset_token_hash END,
                reset_token_expires_at =
                    CASE WHEN reset_token_expires_at < $1 THEN NULL ELSE reset_token_expires_at END
            WHERE otp_expires_at < $1 OR reset_token_expires_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
