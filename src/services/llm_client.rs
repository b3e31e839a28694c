use crate::config::LlmConfig;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Retries after the first attempt.
const MAX_RETRIES: usize = 2;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Connection failures, rate limiting and provider outages are worth another attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { status: 429 | 500..=599, .. })
    }
}

/// A chat model that turns a system prompt plus a user prompt into text.
#[async_trait]
pub trait TextModel: Send + Sync + std::fmt::Debug {
    /// With `json_output` set the model is asked to answer with a single JSON object.
    ///
    /// # Errors
    /// Returns `LlmError` when the provider fails or answers with nothing.
    async fn complete(&self, system: &str, prompt: &str, json_output: bool) -> Result<String, LlmError>;
}

/// Calls `model` in JSON mode and deserializes the answer.
///
/// # Errors
/// Returns `LlmError::Parse` if the answer is not the expected JSON shape.
pub async fn complete_json<T: DeserializeOwned>(model: &dyn TextModel, system: &str, prompt: &str) -> Result<T, LlmError> {
    let text = model.complete(system, prompt, true).await?;
    serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) else {
        return text;
    };
    let rest = rest.trim_start();
    rest.strip_suffix("```").map_or(rest, str::trim)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Clone, Debug)]
struct Metrics {
    requests_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("vitae-server");
        Self {
            requests_total: meter
                .u64_counter("llm_requests_total")
                .with_description("Total number of LLM completion requests by outcome")
                .build(),
        }
    }
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
/// Retries on 429 and 5xx with exponential backoff.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    retry_base: Duration,
    metrics: Metrics,
}

impl OpenAiClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.llm_timeout_secs)).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.llm_base_url.trim_end_matches('/')),
            api_key: config.llm_api_key.clone().filter(|k| !k.is_empty()),
            model: config.llm_model.clone(),
            retry_base: Duration::from_secs(1),
            metrics: Metrics::new(),
        })
    }

    #[must_use]
    pub const fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    async fn call(&self, api_key: &str, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let retry_strategy = ExponentialBuilder::default().with_min_delay(self.retry_base).with_max_times(MAX_RETRIES);

        (|| self.attempt(api_key, body))
            .retry(retry_strategy)
            .when(LlmError::is_transient)
            .notify(|e, delay| {
                tracing::warn!(error = %e, delay_ms = %delay.as_millis(), "LLM call failed, retrying");
            })
            .await
    }

    async fn attempt(&self, api_key: &str, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self.http.post(&self.endpoint).bearer_auth(api_key).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body).map(|e| e.error.message).unwrap_or(body);
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    #[tracing::instrument(skip(self, system, prompt), fields(model = %self.model), err(level = "warn"))]
    async fn complete(&self, system: &str, prompt: &str, json_output: bool) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "system", content: system }, ChatMessage { role: "user", content: prompt }],
            response_format: json_output.then_some(ResponseFormat { kind: "json_object" }),
        };

        let result = self.call(api_key, &body).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        self.metrics.requests_total.add(1, &[KeyValue::new("outcome", outcome)]);
        result
    }
}
