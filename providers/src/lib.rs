//! Upstream agent client with cancellable, incrementally parsed streaming.
//!
//! # Architecture
//!
//! - [`wordware`] - Builds and sends the run request, then hands the body to the read loop
//! - [`process_stream`] - Transport-agnostic read loop feeding a [`StreamSession`]
//! - [`cancel`] - [`CancelToken`], the cooperative stop flag checked around every read
//! - [`channel`] - Task-based submission that reports the latest snapshot and a terminal update
//!
//! # Cancellation
//!
//! The token is checked before each read and again once the read resolves. A chunk
//! that arrives after cancellation is discarded without being parsed, and frames
//! still queued from a chunk are skipped as soon as the flag flips. Cancellation
//! is reported as [`StreamOutcome::Cancelled`], never as an error.
//!
//! # Error Handling
//!
//! Only stream-level failures surface as [`StreamError`]: the request could not be
//! sent, the upstream answered with a non-success status, a read failed or idled
//! out, or the unterminated tail outgrew the buffer cap. Per-frame decode problems
//! are absorbed by the session.

pub mod cancel;
pub mod channel;
pub mod wordware;

use std::fmt::Display;
use std::pin::pin;
use std::sync::OnceLock;
use std::time::Duration;

use agentrace_core::{FrameError, SnapshotSink, StreamSession};
use agentrace_types::Snapshot;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

pub use agentrace_types;
pub use cancel::CancelToken;
pub use channel::{
    ChannelSink, StreamUpdate, Submission, Submitter, UpdateSender, Updates, spawn_answer,
    update_channel,
};
pub use wordware::{ApiConfig, ApiConfigError, stream_answer};

const CONNECT_TIMEOUT_SECS: u64 = 30;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Default idle window between two reads before the stream is abandoned.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("Minimal HTTP client must build; cannot proceed without TLS")
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("agentrace/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream read failed: {0}")]
    Read(String),
    #[error("stream idle for more than {}s", .0.as_secs())]
    IdleTimeout(Duration),
    #[error(transparent)]
    BufferOverflow(#[from] FrameError),
}

/// How a stream that did not fail came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The transport reached end of stream.
    Completed(Snapshot),
    /// Cancelled; holds the last snapshot that was published.
    Cancelled(Snapshot),
}

impl StreamOutcome {
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Self::Completed(snapshot) | Self::Cancelled(snapshot) => snapshot,
        }
    }

    #[must_use]
    pub fn into_snapshot(self) -> Snapshot {
        match self {
            Self::Completed(snapshot) | Self::Cancelled(snapshot) => snapshot,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Drive a byte stream through `session` until it ends, fails, or is cancelled.
///
/// The loop owns no state beyond the session, so any stream of byte chunks works:
/// a `reqwest` body, a channel-backed stream, or an in-memory iterator.
pub async fn process_stream<St, B, E, S>(
    stream: St,
    session: &mut StreamSession<S>,
    cancel: &CancelToken,
    idle_timeout: Duration,
) -> Result<StreamOutcome, StreamError>
where
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    S: SnapshotSink,
{
    let mut stream = pin!(stream);

    loop {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled(session.snapshot()));
        }

        let Ok(next) = tokio::time::timeout(idle_timeout, stream.next()).await else {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled(session.snapshot()));
            }
            return Err(StreamError::IdleTimeout(idle_timeout));
        };

        if cancel.is_cancelled() {
            tracing::debug!("Discarding read that resolved after cancellation");
            return Ok(StreamOutcome::Cancelled(session.snapshot()));
        }

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| StreamError::Read(e.to_string()))?;
        session.feed_while(chunk.as_ref(), || !cancel.is_cancelled())?;
    }

    let snapshot = session.finish();
    let stats = session.stats();
    tracing::debug!(
        frames = stats.frames,
        fragments = stats.fragments,
        dropped_frames = stats.dropped_frames,
        ignored_events = stats.ignored_events,
        generations = snapshot.len(),
        "Stream completed"
    );
    Ok(StreamOutcome::Completed(snapshot))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
