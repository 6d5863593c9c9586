//! Plain-text rendering of snapshots.
//!
//! Snapshots are re-delivered in full, so the printer keeps the last rendered text
//! and writes only the new suffix. When an update rewrites earlier text (rare, e.g.
//! buffered text moving into a field), the whole snapshot is printed again.

use std::io::{self, Write};

use agentrace_types::{Generation, Snapshot};

fn render_generation(generation: &Generation, out: &mut String) {
    out.push('[');
    out.push_str(generation.label());
    out.push(']');

    if !generation.thought().is_empty() {
        out.push_str("\nThought: ");
        out.push_str(generation.thought());
    }
    for step in generation.steps() {
        out.push('\n');
        out.push_str(step.kind().display_name());
        out.push_str(": ");
        out.push_str(step.content());
    }
    if generation.is_completed() {
        out.push_str("\nFinal Answer: ");
        out.push_str(generation.final_answer());
    }
}

#[must_use]
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (index, generation) in snapshot.generations().iter().enumerate() {
        if index > 0 {
            out.push_str("\n\n");
        }
        render_generation(generation, &mut out);
    }
    out
}

pub struct StreamPrinter<W> {
    out: W,
    rendered: String,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rendered: String::new(),
        }
    }

    pub fn show(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let text = render_snapshot(snapshot);
        if let Some(suffix) = text.strip_prefix(self.rendered.as_str()) {
            self.out.write_all(suffix.as_bytes())?;
        } else {
            self.out.write_all(b"\n\n")?;
            self.out.write_all(text.as_bytes())?;
        }
        self.rendered = text;
        self.out.flush()
    }

    /// Terminate the output with a newline once nothing more will be shown.
    pub fn end(&mut self) -> io::Result<()> {
        if !self.rendered.is_empty() {
            self.out.write_all(b"\n")?;
            self.rendered.clear();
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
