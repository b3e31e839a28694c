use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use opentelemetry::{global, metrics::Counter};

#[derive(Clone, Debug)]
pub struct Metrics {
    pub throttled_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            throttled_total: meter
                .u64_counter("rate_limit_throttled_total")
                .with_description("Requests rejected by the rate limiter")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Records requests the governor layers turned away.
pub async fn log_rate_limit_events(State(metrics): State<Metrics>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(path = %path, "Request throttled by rate limiter");
        metrics.throttled_total.add(1, &[]);
    }

    response
}
