use crate::error::Result;
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

/// Clears one-time codes and password reset links once they have been expired for `retention`.
///
/// Until then an expired code or link still reaches the resend path of email verification and
/// password reset.
#[derive(Debug)]
pub struct VerificationCleanupWorker {
    pool: DbPool,
    repo: UserRepository,
    interval_secs: u64,
    retention: Duration,
}

impl VerificationCleanupWorker {
    #[must_use]
    pub const fn new(pool: DbPool, repo: UserRepository, interval_secs: u64, retention_secs: u64) -> Self {
        Self { pool, repo, interval_secs, retention: Duration::from_secs(retention_secs) }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            tracing::info!("Verification cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("run_verification_cleanup"))
                        .await
                    {
                        tracing::error!(error = ?e, "Verification cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Verification cleanup loop shutting down...");
    }

    /// # Errors
    /// Returns an error if the database query fails.
    #[tracing::instrument(skip(self), err, fields(cleared = tracing::field::Empty))]
    pub async fn perform_cleanup(&self) -> Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - self.retention;
        let count = self.repo.clear_expired_verification(&self.pool, cutoff).await?;
        if count > 0 {
            tracing::info!(count = %count, "Cleared expired verification codes and reset links");
            tracing::Span::current().record("cleared", count);
        }
        Ok(count)
    }
}
