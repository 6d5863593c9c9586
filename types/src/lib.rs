//! Core domain types for agentrace.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
pub use ids::GenerationId;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Steps
// ============================================================================

/// Tag of a step inside a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Action,
    Input,
    Observation,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid step kind '{raw}'; expected one of: {expected:?}")]
pub struct StepKindParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Action,
        StepKind::Input,
        StepKind::Observation,
        StepKind::Summary,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StepKind::Action => "action",
            StepKind::Input => "input",
            StepKind::Observation => "observation",
            StepKind::Summary => "summary",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            StepKind::Action => "Action",
            StepKind::Input => "Input",
            StepKind::Observation => "Observation",
            StepKind::Summary => "Summary",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, StepKindParseError> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| StepKindParseError {
                raw: raw.to_string(),
                expected: &["action", "input", "observation", "summary"],
            })
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tagged sub-record of a generation.
///
/// The tag is fixed at construction; only the text content can grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    kind: StepKind,
    content: String,
}

impl Step {
    #[must_use]
    pub fn new(kind: StepKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> StepKind {
        self.kind
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
    }
}

// ============================================================================
// Generations
// ============================================================================

/// Lifecycle of the in-progress generation as seen by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    /// No thought text, step, or answer yet.
    Empty,
    /// At least one field or step carries content.
    Open,
    /// A final answer has been set.
    Completed,
}

/// One structured unit of reasoning output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    id: GenerationId,
    label: String,
    thought: String,
    steps: Vec<Step>,
    final_answer: String,
    is_completed: bool,
}

impl Generation {
    #[must_use]
    pub fn new(id: GenerationId) -> Self {
        Self {
            id,
            label: format!("Generation {id}"),
            thought: String::new(),
            steps: Vec::new(),
            final_answer: String::new(),
            is_completed: false,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn id(&self) -> GenerationId {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn thought(&self) -> &str {
        &self.thought
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn phase(&self) -> GenerationPhase {
        if self.is_completed {
            GenerationPhase::Completed
        } else if !self.thought.is_empty() || !self.steps.is_empty() {
            GenerationPhase::Open
        } else {
            GenerationPhase::Empty
        }
    }

    pub fn set_thought(&mut self, thought: impl Into<String>) {
        self.thought = thought.into();
    }

    pub fn push_thought(&mut self, text: &str) {
        self.thought.push_str(text);
    }

    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Mutable access to the most recent step; earlier steps stay immutable.
    pub fn last_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.last_mut()
    }

    /// Set the final answer. Completion is permanent for this generation.
    pub fn set_final_answer(&mut self, answer: impl Into<String>) {
        self.final_answer = answer.into();
        self.is_completed = true;
    }

    pub fn push_final_answer(&mut self, text: &str) {
        self.final_answer.push_str(text);
        if !self.final_answer.is_empty() {
            self.is_completed = true;
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Full published state: finalized history followed by the in-progress generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Vec<Generation>);

impl Snapshot {
    #[must_use]
    pub fn new(generations: Vec<Generation>) -> Self {
        Self(generations)
    }

    #[must_use]
    pub fn generations(&self) -> &[Generation] {
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

    #[must_use]
    pub fn last(&self) -> Option<&Generation> {
        self.0.last()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Generation> {
        self.0
    }
}

impl From<Vec<Generation>> for Snapshot {
    fn from(value: Vec<Generation>) -> Self {
        Self(value)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Bearer credential for the upstream agent API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}
