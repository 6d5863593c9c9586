//! Synchronous glue from raw bytes to published snapshots.

use agentrace_types::Snapshot;

use crate::builder::ParserState;
use crate::decoder::decode_frame;
use crate::framer::{EventFramer, FrameError, RawFrame};
use crate::markers::classify;

/// Receives the full snapshot after every applied fragment.
pub trait SnapshotSink {
    fn publish(&mut self, snapshot: &Snapshot);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&Snapshot),
{
    fn publish(&mut self, snapshot: &Snapshot) {
        self(snapshot);
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames handed to the decoder.
    pub frames: usize,
    /// Answer fragments applied to the builder (one publish each).
    pub fragments: usize,
    /// Frames dropped as undecodable or invalid UTF-8.
    pub dropped_frames: usize,
    /// Well-formed events that were not answer chunks.
    pub ignored_events: usize,
}

/// One request's parser pipeline: framer, builder, and sink.
#[derive(Debug)]
pub struct StreamSession<S> {
    framer: EventFramer,
    state: ParserState,
    sink: S,
    stats: SessionStats,
}

impl<S: SnapshotSink> StreamSession<S> {
    pub fn new(sink: S) -> Self {
        Self::with_framer(EventFramer::new(), sink)
    }

    pub fn with_max_buffer_bytes(max_buffer_bytes: usize, sink: S) -> Self {
        Self::with_framer(EventFramer::with_max_buffer_bytes(max_buffer_bytes), sink)
    }

    fn with_framer(framer: EventFramer, sink: S) -> Self {
        Self {
            framer,
            state: ParserState::new(),
            sink,
            stats: SessionStats::default(),
        }
    }

    /// Feed one transport read. Returns the number of fragments applied.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<usize, FrameError> {
        self.feed_while(bytes, || true)
    }

    /// Like [`feed`](Self::feed), but stops applying frames as soon as
    /// `keep_going` returns `false`. Frames left over are discarded.
    pub fn feed_while(
        &mut self,
        bytes: &[u8],
        keep_going: impl Fn() -> bool,
    ) -> Result<usize, FrameError> {
        let frames = self.framer.push(bytes)?;
        let mut applied = 0;
        for frame in frames {
            if !keep_going() {
                break;
            }
            if self.handle_frame(&frame) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Flush the trailing frame at end of stream and return the final snapshot.
    pub fn finish(&mut self) -> Snapshot {
        if let Some(frame) = self.framer.finish() {
            self.handle_frame(&frame);
        }
        self.state.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            dropped_frames: self.stats.dropped_frames + self.framer.invalid_frames(),
            ..self.stats
        }
    }

    #[must_use]
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn handle_frame(&mut self, frame: &RawFrame) -> bool {
        self.stats.frames += 1;

        match decode_frame(frame.as_str()) {
            Ok(Some(chunk)) => {
                self.state.apply(&classify(&chunk.content));
                self.stats.fragments += 1;
                self.sink.publish(&self.state.snapshot());
                true
            }
            Ok(None) => {
                self.stats.ignored_events += 1;
                false
            }
            Err(e) => {
                self.stats.dropped_frames += 1;
                tracing::debug!(%e, frame_bytes = frame.len(), "Dropping undecodable event frame");
                false
            }
        }
    }
}
