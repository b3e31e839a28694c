use crate::config::HealthConfig;
use crate::storage::DbPool;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Tables the API cannot serve a request without, resolved through the connection's `search_path`.
const REQUIRED_TABLES: [&str; 2] = ["users", "resumes"];

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            status: meter
                .i64_gauge("vitae_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }

    fn record(&self, component: &'static str, ok: bool) {
        self.status.record(i64::from(ok), &[KeyValue::new("component", component)]);
    }
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("database unreachable: {0}")]
    Unreachable(#[from] sqlx::Error),

    #[error("database check timed out after {0:?}")]
    TimedOut(Duration),

    #[error("schema not migrated, missing table {0}")]
    SchemaMissing(&'static str),
}

/// Optional integrations of this deployment. Readiness reports them but never fails on them:
/// without a relay mail is only logged, without an LLM key resume import and enhancement
/// answer with errors, and without Google credentials `/auth/google` is a 404.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrations {
    pub mail_delivery: bool,
    pub llm: bool,
    pub google_oauth: bool,
}

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    config: HealthConfig,
    integrations: Integrations,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, config: HealthConfig, integrations: Integrations) -> Self {
        Self { pool, config, integrations, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn integrations(&self) -> Integrations {
        self.integrations
    }

    /// Checks that the database answers within the configured timeout and carries the schema.
    ///
    /// # Errors
    /// Returns `HealthError` when the database is unreachable, slow, or not migrated.
    pub async fn check_db(&self) -> Result<(), HealthError> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);
        let result = match timeout(db_timeout, self.missing_table()).await {
            Ok(Ok(None)) => Ok(()),
            Ok(Ok(Some(table))) => Err(HealthError::SchemaMissing(table)),
            Ok(Err(e)) => Err(HealthError::Unreachable(e)),
            Err(_) => Err(HealthError::TimedOut(db_timeout)),
        };
        self.metrics.record("database", result.is_ok());
        result
    }

    async fn missing_table(&self) -> Result<Option<&'static str>, sqlx::Error> {
        for table in REQUIRED_TABLES {
            let present: bool = sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
            if !present {
                return Ok(Some(table));
            }
        }
        Ok(None)
    }
}
