use uuid::Uuid;

/// Token pair minted at login or OAuth callback.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub(crate) user_id: Uuid,
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) expires_at: i64,
}
