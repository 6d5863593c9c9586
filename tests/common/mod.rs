//! Shared test utilities and fixtures
//!
//! Wire-format builders for the upstream event stream plus a mock upstream.

#![allow(dead_code)]

use agentrace_core::StreamSession;
use agentrace_providers::ApiConfig;
use agentrace_types::{ApiKey, Snapshot};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RUN_PATH: &str = "/v1alpha/apps/test/runs/stream";

/// Fragments of one complete reasoning generation.
pub const FIRST_GENERATION: [&str; 5] = [
    "Thought: Check price\n",
    "Action: get_price\n",
    "Input: BTC\n",
    "Observation: 65000\n",
    "Final Answer: BTC is $65000",
];

pub const SECOND_GENERATION: [&str; 5] = [
    "Thought: Check volume\n",
    "Action: get_volume\n",
    "Input: BTC\n",
    "Observation: 120B\n",
    "Final Answer: 120B",
];

/// One `chunk` event on the answer path, terminated by a blank line.
pub fn chunk_event(content: &str) -> String {
    raw_event(
        "chunk",
        &serde_json::json!({"type": "chunk", "path": "answer", "content": content}).to_string(),
    )
}

/// An event with arbitrary `data:` text.
pub fn raw_event(name: &str, data: &str) -> String {
    format!("event: {name}\ndata: {data}\n\n")
}

/// Generation boundary event as the upstream emits it; the parser ignores it.
pub fn generation_event(state: &str) -> String {
    raw_event(
        "generation",
        &serde_json::json!({"type": "generation", "state": state, "path": "answer", "label": "react"})
            .to_string(),
    )
}

/// A stream body made of one answer chunk per fragment.
pub fn answer_body(fragments: &[&str]) -> String {
    fragments.iter().map(|fragment| chunk_event(fragment)).collect()
}

pub fn two_generation_fragments() -> Vec<&'static str> {
    FIRST_GENERATION
        .iter()
        .chain(SECOND_GENERATION.iter())
        .copied()
        .collect()
}

/// Feed `reads` through a fresh session; returns the final and every published snapshot.
pub fn run_reads<'a>(reads: impl IntoIterator<Item = &'a [u8]>) -> (Snapshot, Vec<Snapshot>) {
    let mut published = Vec::new();
    let mut session = StreamSession::new(|snapshot: &Snapshot| published.push(snapshot.clone()));
    for read in reads {
        session.feed(read).unwrap();
    }
    let last = session.finish();
    drop(session);
    (last, published)
}

pub async fn start_upstream_mock() -> MockServer {
    MockServer::start().await
}

/// Mount a successful streaming response with `body` on the run path.
pub async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(format!("{}{RUN_PATH}", server.uri()), ApiKey::new("ww-test")).unwrap()
}

/// Every text field of `before` is a prefix of the same field in `after`.
pub fn assert_grows(before: &Snapshot, after: &Snapshot) {
    assert!(after.len() >= before.len(), "generations disappeared");
    for (old, new) in before.generations().iter().zip(after.generations()) {
        assert_eq!(old.id(), new.id());
        assert!(new.thought().starts_with(old.thought()), "thought shrank");
        assert!(
            new.final_answer().starts_with(old.final_answer()),
            "final answer shrank"
        );
        assert!(new.steps().len() >= old.steps().len(), "steps disappeared");
        for (old_step, new_step) in old.steps().iter().zip(new.steps()) {
            assert_eq!(old_step.kind(), new_step.kind());
            assert!(new_step.content().starts_with(old_step.content()), "step shrank");
        }
        assert!(new.is_completed() || !old.is_completed(), "completion reverted");
    }
}
