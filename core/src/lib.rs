//! Incremental parser that turns a fragmented agent event stream into generations.
//!
//! # Pipeline
//!
//! ```text
//! bytes -> EventFramer -> RawFrame -> decode_frame -> ContentChunk
//!       -> classify -> Classified -> ParserState::apply -> Snapshot -> SnapshotSink
//! ```
//!
//! - [`framer`] splits the byte stream on the `"\n\nevent: "` separator.
//! - [`lenient_json`] recovers partial values from truncated JSON payloads.
//! - [`decoder`] keeps only `chunk` events whose path mentions `answer`.
//! - [`markers`] classifies content fragments by their marker keywords.
//! - [`builder`] folds classified fragments into generations.
//! - [`session`] wires the stages together and publishes after every fragment.
//!
//! Nothing here performs IO or awaits. The transport loop lives in
//! `agentrace-providers`.
//!
//! # Error Handling
//!
//! Per-frame problems (undecodable JSON, missing data lines, invalid UTF-8) are
//! absorbed and logged. The only error that escapes is [`FrameError`], raised when the
//! unterminated tail of the stream outgrows the configured buffer cap.

pub mod builder;
pub mod decoder;
pub mod framer;
pub mod lenient_json;
pub mod markers;
pub mod session;

pub use builder::{OpenField, ParserState};
pub use decoder::{ContentChunk, DecodeError, decode_frame, extract_data};
pub use framer::{DEFAULT_MAX_BUFFER_BYTES, EVENT_DELIMITER, EventFramer, FrameError, RawFrame};
pub use lenient_json::{JsonError, Parsed, parse_lenient};
pub use markers::{Classified, Marker, Section, classify};
pub use session::{SessionStats, SnapshotSink, StreamSession};
