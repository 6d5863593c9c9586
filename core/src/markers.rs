//! Marker keyword recognition.
//!
//! A marker is one of `Thought`, `Action`, `Input`, `Observation`, `Summary`, or
//! `Final Answer`, matched case-insensitively and terminated by a colon. It opens a
//! new section when it starts the fragment (after leading whitespace) or starts any
//! line after a `\n`. Everything else is continuation text for whatever section is
//! already open.
//!
//! Classification is a pure function; all state lives in
//! [`crate::builder::ParserState`].

use std::sync::LazyLock;

use agentrace_types::StepKind;
use regex::Regex;

/// Keyword alternatives; longer spellings come first so `Action Input` wins over `Action`.
static MARKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?i:(thought|action[ \t_-]*input|action|input|observation|summary|final[ \t_-]*answer))[ \t]*:",
    )
    .expect("valid marker regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Thought,
    Action,
    Input,
    Observation,
    Summary,
    FinalAnswer,
}

impl Marker {
    /// Map a keyword as written in the stream to its marker.
    ///
    /// Case, inner spacing, `_`, and `-` are ignored, so `Final Answer`,
    /// `final_answer`, and `FINALANSWER` are the same marker.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let normalized: String = keyword
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|ch| ch.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "thought" => Some(Self::Thought),
            "action" => Some(Self::Action),
            "input" | "actioninput" => Some(Self::Input),
            "observation" => Some(Self::Observation),
            "summary" => Some(Self::Summary),
            "finalanswer" => Some(Self::FinalAnswer),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thought => "Thought",
            Self::Action => "Action",
            Self::Input => "Input",
            Self::Observation => "Observation",
            Self::Summary => "Summary",
            Self::FinalAnswer => "Final Answer",
        }
    }

    /// Step tag for markers that append a step; `None` for thought and final answer.
    #[must_use]
    pub const fn step_kind(self) -> Option<StepKind> {
        match self {
            Self::Action => Some(StepKind::Action),
            Self::Input => Some(StepKind::Input),
            Self::Observation => Some(StepKind::Observation),
            Self::Summary => Some(StepKind::Summary),
            Self::Thought | Self::FinalAnswer => None,
        }
    }
}

/// A marked section opened by a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub marker: Marker,
    /// Seed text after the colon, followed by any further lines up to the next marker.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// The whole fragment extends the currently open field.
    Continuation(String),
    /// The fragment opens one or more sections.
    Sections {
        /// Text before the first marker line; extends the currently open field.
        lead: String,
        sections: Vec<Section>,
    },
}

impl Classified {
    #[must_use]
    pub fn starts_section(&self) -> bool {
        matches!(self, Self::Sections { .. })
    }
}

struct Hit {
    /// Byte offset where the marker line starts.
    line_start: usize,
    /// Byte offset just past the colon.
    body_start: usize,
    marker: Marker,
}

fn match_marker(line: &str) -> Option<(Marker, usize)> {
    let captures = MARKER_LINE.captures(line)?;
    let keyword = captures.get(1)?.as_str();
    let end = captures.get(0)?.end();
    match Marker::from_keyword(keyword) {
        Some(marker) => Some((marker, end)),
        None => {
            tracing::debug!(keyword, "Unrecognized marker keyword treated as text");
            None
        }
    }
}

/// Seed (rest of the marker line) plus trailing lines, newline-joined.
fn section_content(body: &str) -> String {
    let (seed, rest) = body.split_once('\n').unwrap_or((body, ""));
    let seed = seed.trim();
    let rest = rest.trim_end();

    let mut content = String::with_capacity(seed.len() + rest.len() + 1);
    content.push_str(seed);
    if !rest.is_empty() {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(rest);
    }
    content
}

#[must_use]
pub fn classify(fragment: &str) -> Classified {
    let trimmed = fragment.trim_start();
    let leading = fragment.len() - trimmed.len();
    let mut hits = Vec::new();

    if let Some((marker, end)) = match_marker(trimmed) {
        hits.push(Hit {
            line_start: leading,
            body_start: leading + end,
            marker,
        });
    }

    for (newline, _) in fragment.match_indices('\n') {
        let line_start = newline + 1;
        if line_start <= leading {
            continue;
        }
        if let Some((marker, end)) = match_marker(&fragment[line_start..]) {
            hits.push(Hit {
                line_start,
                body_start: line_start + end,
                marker,
            });
        }
    }

    let Some(first) = hits.first() else {
        return Classified::Continuation(fragment.to_string());
    };

    let lead = fragment[..first.line_start].trim_end_matches(['\n', '\r']);
    let lead = if lead.trim().is_empty() { "" } else { lead };

    let sections = hits
        .iter()
        .enumerate()
        .map(|(index, hit)| {
            let body_end = hits
                .get(index + 1)
                .map_or(fragment.len(), |next| next.line_start);
            Section {
                marker: hit.marker,
                content: section_content(&fragment[hit.body_start..body_end]),
            }
        })
        .collect();

    Classified::Sections {
        lead: lead.to_string(),
        sections,
    }
}
