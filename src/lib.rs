#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod workers;

use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::auth_service::AuthService;
use crate::services::health_service::{HealthService, Integrations};
use crate::services::llm_client::{OpenAiClient, TextModel};
use crate::services::mail_service::{HttpMailer, LogMailer, MailService, Mailer};
use crate::services::oauth_service::{GoogleClient, OAuthService};
use crate::services::resume_service::ResumeService;
use crate::services::token_service::TokenService;
use crate::storage::DbPool;
use crate::storage::resume_repo::ResumeRepository;
use crate::storage::user_repo::UserRepository;
use crate::workers::VerificationCleanupWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips `shutdown_tx` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through `tracing` so they reach the configured log output.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}

/// Background loops started after the servers are wired.
#[derive(Debug)]
pub struct Workers {
    verification_cleanup: VerificationCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.verification_cleanup.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires services from configuration plus the resources created at startup.
/// The mailer, text model and HTTP client are overridable for tests.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    mailer: Option<Arc<dyn Mailer>>,
    text_model: Option<Arc<dyn TextModel>>,
    http_client: Option<reqwest::Client>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, mailer: None, text_model: None, http_client: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn with_text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http_client = Some(http);
        self
    }

    /// # Errors
    /// Returns an error if the database was not provided or any service
    /// rejects its configuration.
    pub fn build(self) -> anyhow::Result<App> {
        let config = self.config;
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("database pool is required"))?;
        let http = match self.http_client {
            Some(http) => http,
            None => reqwest::Client::builder().timeout(std::time::Duration::from_secs(30)).build()?,
        };

        let mut integrations = Integrations {
            mail_delivery: self.mailer.is_some() || config.mail.mail_relay_url.is_some(),
            llm: self.text_model.is_some() || config.llm.llm_api_key.as_deref().is_some_and(|k| !k.is_empty()),
            google_oauth: false,
        };

        let mailer: Arc<dyn Mailer> = match (self.mailer, &config.mail.mail_relay_url) {
            (Some(mailer), _) => mailer,
            (None, Some(url)) => Arc::new(HttpMailer::new(http.clone(), url.clone(), config.mail.mail_relay_token.clone())),
            (None, None) => {
                tracing::warn!("No mail relay configured; emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let text_model: Arc<dyn TextModel> = match self.text_model {
            Some(model) => model,
            None => Arc::new(OpenAiClient::new(&config.llm)?),
        };

        let google = GoogleClient::from_config(&config.google)?;
        integrations.google_oauth = google.is_some();
        if google.is_none() {
            tracing::info!("Google sign-in disabled (no client credentials)");
        }

        let user_repo = UserRepository::new();
        let resume_repo = ResumeRepository::new();

        let tokens = TokenService::new(&config.auth)?;
        let auth_service = AuthService::new(pool.clone(), user_repo.clone(), tokens);
        let mail_service = MailService::new(mailer, &config.mail);
        let account_service = AccountService::new(
            pool.clone(),
            user_repo.clone(),
            auth_service.clone(),
            mail_service,
            &config.auth,
            &config.client,
        );
        let oauth_service = OAuthService::new(pool.clone(), user_repo.clone(), auth_service.clone(), http, google);
        let resume_service = ResumeService::new(pool.clone(), resume_repo, text_model);
        let health_service = HealthService::new(pool.clone(), config.health.clone(), integrations);

        let workers = Workers {
            verification_cleanup: VerificationCleanupWorker::new(
                pool.clone(),
                user_repo,
                config.workers.verification_cleanup_interval_secs,
                config.workers.verification_retention_secs,
            ),
        };

        Ok(App {
            services: ServiceContainer { pool, auth_service, account_service, oauth_service, resume_service },
            health_service,
            workers,
        })
    }
}
