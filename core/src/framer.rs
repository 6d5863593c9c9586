//! Event framing over a raw byte stream.
//!
//! Frames are separated by `"\n\nevent: "`. Bytes are buffered until a full
//! separator has been seen, so a separator or a multi-byte UTF-8 sequence split
//! across two transport reads is reassembled before anything is emitted.

use std::mem;

use thiserror::Error;

/// Separator between two event frames on the wire.
pub const EVENT_DELIMITER: &[u8] = b"\n\nevent: ";

/// Upper bound on the unterminated tail kept between reads.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("event buffer exceeded maximum size ({limit} bytes)")]
    BufferOverflow { limit: usize },
}

/// One complete event frame, still carrying its `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
pub struct EventFramer {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known not to contain the start of a separator.
    scanned: usize,
    max_buffer_bytes: usize,
    invalid_frames: usize,
}

impl Default for EventFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFramer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_buffer_bytes(DEFAULT_MAX_BUFFER_BYTES)
    }

    #[must_use]
    pub fn with_max_buffer_bytes(max_buffer_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_buffer_bytes,
            invalid_frames: 0,
        }
    }

    /// Append a transport read and drain every frame it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<RawFrame>, FrameError> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(frame) = self.drain_next() {
            if let Some(frame) = self.decode(frame) {
                frames.push(frame);
            }
        }

        // Security: prevent unbounded buffer growth
        if self.buffer.len() > self.max_buffer_bytes {
            return Err(FrameError::BufferOverflow {
                limit: self.max_buffer_bytes,
            });
        }

        Ok(frames)
    }

    /// Flush the trailing frame once the transport reports end of stream.
    pub fn finish(&mut self) -> Option<RawFrame> {
        let tail = mem::take(&mut self.buffer);
        self.scanned = 0;
        self.decode(tail)
    }

    /// Bytes buffered and not yet emitted as a frame.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Frames dropped because they were not valid UTF-8.
    #[must_use]
    pub fn invalid_frames(&self) -> usize {
        self.invalid_frames
    }

    fn find_delimiter(&self) -> Option<usize> {
        self.buffer
            .get(self.scanned..)?
            .windows(EVENT_DELIMITER.len())
            .position(|window| window == EVENT_DELIMITER)
            .map(|pos| pos + self.scanned)
    }

    fn drain_next(&mut self) -> Option<Vec<u8>> {
        let Some(pos) = self.find_delimiter() else {
            // A separator that starts in the last `len - 1` bytes may still complete.
            self.scanned = self
                .buffer
                .len()
                .saturating_sub(EVENT_DELIMITER.len() - 1);
            return None;
        };

        let frame = self.buffer[..pos].to_vec();
        self.buffer.drain(..pos + EVENT_DELIMITER.len());
        self.scanned = 0;
        Some(frame)
    }

    fn decode(&mut self, frame: Vec<u8>) -> Option<RawFrame> {
        if frame.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match String::from_utf8(frame) {
            Ok(text) => Some(RawFrame(text)),
            Err(e) => {
                self.invalid_frames += 1;
                tracing::warn!(
                    frame_bytes = e.as_bytes().len(),
                    "Dropping event frame with invalid UTF-8"
                );
                None
            }
        }
    }
}
