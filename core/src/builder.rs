//! Generation builder: folds classified fragments into generation records.
//!
//! The builder owns exactly one in-progress [`Generation`] plus the finalized
//! history before it. A `Thought` marker seen while the current generation already
//! has content rotates it into history; every other marker fills the current one.
//!
//! ```text
//! EMPTY --Thought/step--> OPEN --Final Answer--> COMPLETED
//!   ^                      |                        |
//!   +------ Thought (rotate into history) ----------+
//! ```

use std::mem;

use agentrace_types::{Generation, GenerationId, GenerationPhase, Snapshot, Step};

use crate::markers::{Classified, Marker, Section};

/// Field currently receiving continuation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenField {
    Thought,
    LastStep,
    FinalAnswer,
}

/// Parser state for one request. Created per submission and never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    history: Vec<Generation>,
    current: Generation,
    open_field: Option<OpenField>,
    pending_text: String,
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            current: Generation::new(GenerationId::FIRST),
            open_field: None,
            pending_text: String::new(),
        }
    }

    /// Apply one classified fragment.
    pub fn apply(&mut self, classified: &Classified) {
        match classified {
            Classified::Continuation(text) => self.append_continuation(text),
            Classified::Sections { lead, sections } => {
                if !lead.is_empty() {
                    self.append_continuation(lead);
                }
                for section in sections {
                    self.open_section(section);
                }
            }
        }
    }

    /// Finalized history followed by the in-progress generation.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut generations = Vec::with_capacity(self.history.len() + 1);
        generations.extend(self.history.iter().cloned());
        generations.push(self.current.clone());
        Snapshot::new(generations)
    }

    #[must_use]
    pub fn history(&self) -> &[Generation] {
        &self.history
    }

    #[must_use]
    pub fn current(&self) -> &Generation {
        &self.current
    }

    /// Text received before any marker, waiting for the first field to open.
    #[must_use]
    pub fn pending_text(&self) -> &str {
        &self.pending_text
    }

    #[must_use]
    pub fn open_field(&self) -> Option<OpenField> {
        self.open_field
    }

    fn append_continuation(&mut self, text: &str) {
        match self.open_field {
            Some(OpenField::Thought) => self.current.push_thought(text),
            Some(OpenField::FinalAnswer) => self.current.push_final_answer(text),
            Some(OpenField::LastStep) => match self.current.last_step_mut() {
                Some(step) => step.push_str(text),
                None => self.pending_text.push_str(text),
            },
            None => self.pending_text.push_str(text),
        }
    }

    fn open_section(&mut self, section: &Section) {
        let content = self.take_pending(&section.content);

        match section.marker {
            Marker::Thought => {
                if self.current.phase() != GenerationPhase::Empty {
                    self.rotate();
                }
                self.current.set_thought(content);
                self.open_field = Some(OpenField::Thought);
            }
            Marker::FinalAnswer => {
                // A repeated marker extends the published answer instead of replacing it.
                if self.current.final_answer().is_empty() {
                    self.current.set_final_answer(content);
                } else {
                    self.current.push_final_answer("\n");
                    self.current.push_final_answer(&content);
                }
                self.open_field = Some(OpenField::FinalAnswer);
            }
            marker => {
                let Some(kind) = marker.step_kind() else {
                    return;
                };
                self.current.push_step(Step::new(kind, content));
                self.open_field = Some(OpenField::LastStep);
            }
        }
    }

    /// Prefix `content` with any buffered pre-marker text.
    fn take_pending(&mut self, content: &str) -> String {
        let pending = mem::take(&mut self.pending_text);
        let pending = pending.trim();
        match (pending.is_empty(), content.is_empty()) {
            (true, _) => content.to_string(),
            (false, true) => pending.to_string(),
            (false, false) => format!("{pending}\n{content}"),
        }
    }

    fn rotate(&mut self) {
        let next = Generation::new(self.current.id().next());
        let finished = mem::replace(&mut self.current, next);
        tracing::debug!(
            finished = %finished.id(),
            steps = finished.steps().len(),
            completed = finished.is_completed(),
            "Starting new generation"
        );
        self.history.push(finished);
        self.open_field = None;
    }
}
