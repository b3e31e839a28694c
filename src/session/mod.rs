//! Client side of session continuity: a typed API client that recovers from an
//! expired access token exactly once per request, and the page-tier route guard.

pub mod client;
pub mod coordinator;
pub mod guard;
pub mod store;

pub use client::{ApiClient, HttpTokenExchange};
pub use coordinator::{RefreshCoordinator, TokenExchange};
pub use guard::{GuardDecision, GuardState, HttpTokenCheck, ProbeOutcome, SessionProbe, TokenCheck, decide, route_guard};
pub use store::{AccessSnapshot, SessionStore};

use thiserror::Error;

/// Errors surfaced to callers of [`ApiClient`].
///
/// `Clone` so a single refresh outcome can be handed to every queued caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("request was rejected after refreshing the session")]
    Unauthorized,
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),
    #[error("session refresh timed out")]
    RefreshTimeout,
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("refresh was abandoned before it settled")]
    Cancelled,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
