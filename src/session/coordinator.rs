use crate::session::ClientError;
use crate::session::store::SessionStore;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

type Outcome = Result<String, ClientError>;

/// Trades a refresh token for a new access token.
#[async_trait]
pub trait TokenExchange: Send + Sync + Debug {
    async fn exchange(&self, refresh_token: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Outcome>),
    Stale(String),
}

/// Serializes refresh exchanges for one session.
///
/// The first caller to report a 401 performs the exchange; callers arriving
/// while it is in flight wait for its outcome instead of starting their own.
/// The state lock is never held across an `.await`.
#[derive(Debug)]
pub struct RefreshCoordinator {
    exchange: Arc<dyn TokenExchange>,
    store: Arc<SessionStore>,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(exchange: Arc<dyn TokenExchange>, store: Arc<SessionStore>, timeout: Duration) -> Self {
        Self { exchange, store, timeout, state: Mutex::new(RefreshState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Returns an access token newer than the one that produced the 401.
    ///
    /// `failed_generation` is the store generation the rejected request was
    /// sent with. If the store has already moved past it, the current token
    /// is returned without a new exchange.
    ///
    /// # Errors
    /// Returns `RefreshFailed`, `RefreshTimeout` or `MissingRefreshToken` when
    /// the exchange does not produce a token; every queued caller receives the
    /// same error.
    pub async fn refresh(&self, failed_generation: u64) -> Result<String, ClientError> {
        let role = {
            let mut state = self.lock();
            let current = self.store.access();
            match current.token {
                Some(token) if current.generation > failed_generation => Role::Stale(token),
                _ if state.refreshing => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push(tx);
                    Role::Waiter(rx)
                }
                _ => {
                    state.refreshing = true;
                    Role::Leader
                }
            }
        };

        match role {
            Role::Stale(token) => {
                tracing::debug!("Access token already replaced; retrying with the current one");
                Ok(token)
            }
            Role::Waiter(rx) => rx.await.unwrap_or(Err(ClientError::Cancelled)),
            Role::Leader => {
                let guard = LeaderGuard { coordinator: self, armed: true };
                let outcome = self.run_exchange().await;
                guard.settle(&outcome);
                outcome
            }
        }
    }

    async fn run_exchange(&self) -> Outcome {
        let refresh_token = self.store.refresh_token().ok_or(ClientError::MissingRefreshToken)?;

        match tokio::time::timeout(self.timeout, self.exchange.exchange(&refresh_token)).await {
            Ok(Ok(token)) => {
                tracing::debug!("Session refreshed");
                Ok(token)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Session refresh failed");
                Err(match e {
                    ClientError::RefreshFailed(_) | ClientError::MissingRefreshToken => e,
                    other => ClientError::RefreshFailed(other.to_string()),
                })
            }
            Err(_) => {
                tracing::warn!(timeout_ms = %self.timeout.as_millis(), "Session refresh timed out");
                Err(ClientError::RefreshTimeout)
            }
        }
    }

    fn finish(&self, outcome: &Outcome) {
        if let Ok(token) = outcome {
            self.store.set_access_token(token.clone());
        }

        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Resets the in-flight flag even if the leader's future is dropped mid-exchange.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.armed = false;
        self.coordinator.finish(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.finish(&Err(ClientError::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeExchange {
        calls: AtomicUsize,
        delay: Duration,
        result: Outcome,
    }

    impl FakeExchange {
        fn new(delay: Duration, result: Outcome) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay, result })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenExchange for FakeExchange {
        async fn exchange(&self, refresh_token: &str) -> Result<String, ClientError> {
            assert_eq!(refresh_token, "refresh");
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn coordinator(exchange: Arc<FakeExchange>, timeout: Duration) -> (Arc<RefreshCoordinator>, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::with_tokens(Some("old".into()), Some("refresh".into())));
        (Arc::new(RefreshCoordinator::new(exchange, Arc::clone(&store), timeout)), store)
    }

    async fn refresh_concurrently(coordinator: &Arc<RefreshCoordinator>, n: usize) -> Vec<Outcome> {
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let c = Arc::clone(coordinator);
                tokio::spawn(async move { c.refresh(0).await })
            })
            .collect();
        futures::future::join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let exchange = FakeExchange::new(Duration::from_millis(50), Ok("new".into()));
        let (coordinator, store) = coordinator(Arc::clone(&exchange), DEFAULT_REFRESH_TIMEOUT);

        let outcomes = refresh_concurrently(&coordinator, 10).await;

        assert_eq!(exchange.calls(), 1);
        assert!(outcomes.iter().all(|o| o.as_deref() == Ok("new")));
        assert_eq!(store.access().token.as_deref(), Some("new"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_rejects_every_caller() {
        let exchange = FakeExchange::new(Duration::from_millis(50), Err(ClientError::RefreshFailed("401".into())));
        let (coordinator, store) = coordinator(Arc::clone(&exchange), DEFAULT_REFRESH_TIMEOUT);

        let outcomes = refresh_concurrently(&coordinator, 5).await;

        assert_eq!(exchange.calls(), 1);
        assert!(outcomes.iter().all(|o| matches!(o, Err(ClientError::RefreshFailed(_)))));
        assert_eq!(store.access().token.as_deref(), Some("old"));

        // Back to idle: the next 401 starts a fresh exchange.
        let _ = coordinator.refresh(0).await;
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_rejects_every_caller() {
        let exchange = FakeExchange::new(Duration::from_secs(5), Ok("late".into()));
        let (coordinator, _store) = coordinator(exchange, Duration::from_millis(50));

        let outcomes = refresh_concurrently(&coordinator, 4).await;

        assert!(outcomes.iter().all(|o| *o == Err(ClientError::RefreshTimeout)));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_stale_generation_skips_exchange() {
        let exchange = FakeExchange::new(Duration::ZERO, Ok("unused".into()));
        let (coordinator, store) = coordinator(Arc::clone(&exchange), DEFAULT_REFRESH_TIMEOUT);
        let generation = store.set_access_token("current".into());

        let token = coordinator.refresh(generation - 1).await.expect("refresh");

        assert_eq!(token, "current");
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let exchange = FakeExchange::new(Duration::ZERO, Ok("unused".into()));
        let store = Arc::new(SessionStore::with_tokens(Some("old".into()), None));
        let coordinator = RefreshCoordinator::new(Arc::clone(&exchange) as Arc<dyn TokenExchange>, store, DEFAULT_REFRESH_TIMEOUT);

        assert_eq!(coordinator.refresh(0).await, Err(ClientError::MissingRefreshToken));
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let exchange = FakeExchange::new(Duration::from_secs(5), Ok("late".into()));
        let (coordinator, _store) = coordinator(exchange, DEFAULT_REFRESH_TIMEOUT);

        let leader = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move { c.refresh(0).await })
        };
        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
        let waiter = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move { c.refresh(0).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(waiter.await.expect("task panicked"), Err(ClientError::Cancelled));
        assert!(!coordinator.is_refreshing());
    }
}
