use crate::domain::user::{AuthProvider, User};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str = "id, username, email, password_hash, is_verified, otp_hash, otp_expires_at, \
     reset_token_expires_at, providers, google_id, created_at";

#[derive(sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub providers: Vec<String>,
    pub google_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let providers = record
            .providers
            .iter()
            .filter_map(|p| match p.parse::<AuthProvider>() {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!(user_id = %record.id, error = %e, "Ignoring stored provider");
                    None
                }
            })
            .collect();

        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            is_verified: record.is_verified,
            otp_hash: record.otp_hash,
            otp_expires_at: record.otp_expires_at,
            reset_token_expires_at: record.reset_token_expires_at,
            providers,
            google_id: record.google_id,
            created_at: record.created_at,
        }
    }
}
