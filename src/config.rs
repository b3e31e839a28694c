use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub cookies: CookieConfig,

    #[command(flatten)]
    pub client: ClientConfig,

    #[command(flatten)]
    pub google: GoogleConfig,

    #[command(flatten)]
    pub mail: MailConfig,

    #[command(flatten)]
    pub llm: LlmConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub workers: WorkerConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long, env = "VITAE_DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "VITAE_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection before failing
    #[arg(long, env = "VITAE_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "VITAE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "VITAE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Port for liveness and readiness probes
    #[arg(long, env = "VITAE_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "VITAE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for signing access tokens
    #[arg(long, env = "VITAE_ACCESS_TOKEN_SECRET")]
    pub access_token_secret: String,

    /// Secret key for signing refresh tokens (must differ from the access secret)
    #[arg(long, env = "VITAE_REFRESH_TOKEN_SECRET")]
    pub refresh_token_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "VITAE_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in days
    #[arg(long, env = "VITAE_REFRESH_TOKEN_TTL_DAYS", default_value_t = 30)]
    pub refresh_token_ttl_days: i64,

    /// Lifetime of an email verification code in seconds
    #[arg(long, env = "VITAE_OTP_TTL_SECS", default_value_t = 600)]
    pub otp_ttl_secs: i64,

    /// Lifetime of a password reset link in seconds
    #[arg(long, env = "VITAE_RESET_TOKEN_TTL_SECS", default_value_t = 600)]
    pub reset_token_ttl_secs: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

#[derive(Clone, Debug, Args)]
pub struct CookieConfig {
    /// Deployment environment; controls the Secure and SameSite cookie attributes
    #[arg(long, env = "VITAE_ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,
}

impl CookieConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(Clone, Debug, Args)]
pub struct ClientConfig {
    /// Public origin of the web client, used for email links and OAuth redirects
    #[arg(long, env = "VITAE_CLIENT_DOMAIN", default_value = "http://localhost:3000")]
    pub client_domain: String,
}

#[derive(Clone, Debug, Args)]
pub struct GoogleConfig {
    /// Google OAuth client id; Google sign-in is disabled when unset
    #[arg(long, env = "VITAE_GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret
    #[arg(long, env = "VITAE_GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    /// Redirect URI registered with Google
    #[arg(long, env = "VITAE_GOOGLE_CALLBACK_URL")]
    pub google_callback_url: Option<String>,

    #[arg(long, env = "VITAE_GOOGLE_AUTH_URL", default_value = "https://accounts.google.com/o/oauth2/v2/auth")]
    pub google_auth_url: String,

    #[arg(long, env = "VITAE_GOOGLE_TOKEN_URL", default_value = "https://oauth2.googleapis.com/token")]
    pub google_token_url: String,

    #[arg(long, env = "VITAE_GOOGLE_USERINFO_URL", default_value = "https://openidconnect.googleapis.com/v1/userinfo")]
    pub google_userinfo_url: String,
}

#[derive(Clone, Debug, Args)]
pub struct MailConfig {
    /// HTTP mail relay endpoint; messages are only logged when unset
    #[arg(long, env = "VITAE_MAIL_RELAY_URL")]
    pub mail_relay_url: Option<String>,

    /// Bearer token presented to the mail relay
    #[arg(long, env = "VITAE_MAIL_RELAY_TOKEN")]
    pub mail_relay_token: Option<String>,

    /// Sender address
    #[arg(long, env = "VITAE_MAIL_FROM", default_value = "no-reply@vitae.local")]
    pub mail_from: String,

    /// Product name used in email subjects
    #[arg(long, env = "VITAE_APP_NAME", default_value = "Vitae")]
    pub app_name: String,
}

#[derive(Clone, Debug, Args)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "VITAE_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    /// API key for the LLM provider
    #[arg(long, env = "VITAE_LLM_API_KEY")]
    pub llm_api_key: Option<String>,

    /// Chat model used for extraction and enhancement
    #[arg(long, env = "VITAE_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// Request timeout for LLM calls in seconds
    #[arg(long, env = "VITAE_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "VITAE_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "VITAE_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for credential endpoints (register, login, password reset)
    #[arg(long, env = "VITAE_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for credential endpoints
    #[arg(long, env = "VITAE_AUTH_RATE_LIMIT_BURST", default_value_t = 5)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct WorkerConfig {
    /// How often to purge expired verification codes and reset links (0 disables)
    #[arg(long, env = "VITAE_VERIFICATION_CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    pub verification_cleanup_interval_secs: u64,

    /// How long an expired code or reset link is kept so it can still trigger a resend
    #[arg(long, env = "VITAE_VERIFICATION_RETENTION_SECS", default_value_t = 86_400)]
    pub verification_retention_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check in milliseconds
    #[arg(long, env = "VITAE_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "VITAE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are only exported when set
    #[arg(long, env = "VITAE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec![
            "vitae-server",
            "--database-url",
            "postgres://localhost/vitae",
            "--access-token-secret",
            "access",
            "--refresh-token-secret",
            "refresh",
        ];
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.auth.access_token_ttl_secs, 900);
        assert_eq!(config.auth.refresh_token_ttl_days, 30);
        assert_eq!(config.server.port, 8000);
        assert!(!config.cookies.is_production());
        assert!(config.google.google_client_id.is_none());
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
    }

    #[test]
    fn test_production_environment() {
        let config = parse(&["--environment", "production"]);
        assert!(config.cookies.is_production());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let result = Config::try_parse_from(["vitae-server", "--database-url", "postgres://localhost/vitae"]);
        assert!(result.is_err());
    }
}
