//! Wordware run API: request construction and the streaming entry point.

use std::time::Duration;

use agentrace_core::{DEFAULT_MAX_BUFFER_BYTES, SnapshotSink, StreamSession};
use agentrace_types::ApiKey;
use serde::Serialize;
use thiserror::Error;

use crate::{
    CancelToken, DEFAULT_IDLE_TIMEOUT, StreamError, StreamOutcome, http_client, process_stream,
    read_capped_error_body,
};

/// App version constraint sent with every run.
pub const DEFAULT_VERSION: &str = "^3.4";

/// Endpoint, credential, and stream limits for one upstream app.
///
/// ```rust
/// use std::time::Duration;
/// use agentrace_providers::ApiConfig;
/// use agentrace_providers::agentrace_types::ApiKey;
///
/// let config = ApiConfig::new("https://example.test/runs/stream", ApiKey::new("ww-test"))
///     .unwrap()
///     .with_idle_timeout(Duration::from_secs(30));
/// assert_eq!(config.version(), "^3.4");
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_url: String,
    api_key: ApiKey,
    version: String,
    idle_timeout: Duration,
    max_buffer_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiConfigError {
    #[error("API URL is empty")]
    MissingUrl,
    #[error("API URL must use http:// or https://, got {0:?}")]
    InvalidUrl(String),
    #[error("API key is empty")]
    MissingKey,
}

impl ApiConfig {
    pub fn new(api_url: impl Into<String>, api_key: ApiKey) -> Result<Self, ApiConfigError> {
        let api_url = api_url.into().trim().to_string();
        if api_url.is_empty() {
            return Err(ApiConfigError::MissingUrl);
        }
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(ApiConfigError::InvalidUrl(api_url));
        }
        if api_key.is_empty() {
            return Err(ApiConfigError::MissingKey);
        }

        Ok(Self {
            api_url,
            api_key,
            version: DEFAULT_VERSION.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Zero is ignored; the default window stays in place.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        if !idle_timeout.is_zero() {
            self.idle_timeout = idle_timeout;
        }
        self
    }

    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: usize) -> Self {
        if max_buffer_bytes > 0 {
            self.max_buffer_bytes = max_buffer_bytes;
        }
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub const fn max_buffer_bytes(&self) -> usize {
        self.max_buffer_bytes
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    inputs: RunInputs<'a>,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct RunInputs<'a> {
    question: &'a str,
}

fn build_request_body<'a>(config: &'a ApiConfig, question: &'a str) -> RunRequest<'a> {
    RunRequest {
        inputs: RunInputs { question },
        version: config.version(),
    }
}

async fn send_run_request(
    config: &ApiConfig,
    question: &str,
) -> Result<reqwest::Response, StreamError> {
    let auth_header = format!("Bearer {}", config.api_key().expose_secret());

    let response = http_client()
        .post(config.api_url())
        .header("Authorization", &auth_header)
        .header("accept", "text/event-stream")
        .json(&build_request_body(config, question))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = read_capped_error_body(response).await;
        tracing::warn!(status = status.as_u16(), "Upstream rejected run request");
        return Err(StreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Submit `question` and parse the streamed answer into `sink`.
///
/// Each call owns a fresh parser session; nothing is shared between requests.
pub async fn stream_answer<S: SnapshotSink>(
    config: &ApiConfig,
    question: &str,
    sink: S,
    cancel: &CancelToken,
) -> Result<StreamOutcome, StreamError> {
    let mut session = StreamSession::with_max_buffer_bytes(config.max_buffer_bytes(), sink);
    if cancel.is_cancelled() {
        return Ok(StreamOutcome::Cancelled(session.snapshot()));
    }

    tracing::info!(
        question_bytes = question.len(),
        version = config.version(),
        "Submitting question"
    );
    let response = send_run_request(config, question).await?;

    process_stream(
        response.bytes_stream(),
        &mut session,
        cancel,
        config.idle_timeout(),
    )
    .await
}
