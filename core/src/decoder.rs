//! Event decoding: `data:` extraction, tolerant JSON, and payload filtering.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::lenient_json::{JsonError, parse_lenient};

/// Substring a chunk's `path` must contain for its content to reach the parser.
const ANSWER_PATH_MARKER: &str = "answer";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame carries no data lines")]
    NoData,
    #[error("unrecoverable JSON payload: {0}")]
    Json(#[from] JsonError),
}

/// Content fragment forwarded to the marker recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    pub path: String,
    pub content: String,
    /// `false` when the payload was recovered from truncated JSON.
    pub complete: bool,
}

/// Wire payload, tagged by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Payload {
    Chunk {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        content: Option<Value>,
    },
    /// Any other event type (generation boundaries, outputs, heartbeats).
    #[serde(other)]
    Unknown,
}

/// Concatenate the `data:` lines of a frame with their prefix stripped.
#[must_use]
pub fn extract_data(frame: &str) -> Option<String> {
    let mut data = String::new();
    let mut found = false;

    for line in frame.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(mut rest) = line.strip_prefix("data:") {
            if let Some(stripped) = rest.strip_prefix(' ') {
                rest = stripped;
            }
            data.push_str(rest);
            found = true;
        }
    }

    if found { Some(data) } else { None }
}

/// Decode one frame into an answer fragment.
///
/// `Ok(None)` means the frame was well-formed enough to read but is not an answer
/// chunk; callers skip it without side effects.
pub fn decode_frame(frame: &str) -> Result<Option<ContentChunk>, DecodeError> {
    let data = extract_data(frame).ok_or(DecodeError::NoData)?;
    let parsed = parse_lenient(&data)?;

    if !parsed.complete {
        tracing::debug!(payload_bytes = data.len(), "Recovered truncated event payload");
    }

    let payload = match serde_json::from_value::<Payload>(parsed.value) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::trace!(%e, "Ignoring event without a usable type");
            return Ok(None);
        }
    };

    let Payload::Chunk { path, content } = payload else {
        return Ok(None);
    };

    let Some(path) = path.filter(|path| path.contains(ANSWER_PATH_MARKER)) else {
        return Ok(None);
    };

    let Some(Value::String(content)) = content else {
        return Ok(None);
    };

    Ok(Some(ContentChunk {
        path,
        content,
        complete: parsed.complete,
    }))
}
