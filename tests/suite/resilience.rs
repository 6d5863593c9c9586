//! Parser behavior over whole streams: splitting, replay, and malformed input.

use agentrace_core::{ParserState, classify};
use agentrace_types::StepKind;

use crate::common::{
    FIRST_GENERATION, answer_body, assert_grows, chunk_event, raw_event, run_reads,
    two_generation_fragments,
};

#[test]
fn marker_driven_splitting_yields_one_generation() {
    let (snapshot, published) = run_reads([answer_body(&FIRST_GENERATION).as_bytes()]);

    assert_eq!(published.len(), FIRST_GENERATION.len());
    assert_eq!(snapshot.len(), 1);

    let generation = &snapshot.generations()[0];
    assert_eq!(generation.thought(), "Check price");
    let steps: Vec<_> = generation
        .steps()
        .iter()
        .map(|step| (step.kind(), step.content()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (StepKind::Action, "get_price"),
            (StepKind::Input, "BTC"),
            (StepKind::Observation, "65000"),
        ]
    );
    assert_eq!(generation.final_answer(), "BTC is $65000");
    assert!(generation.is_completed());
}

#[test]
fn second_thought_starts_second_generation() {
    let (snapshot, _) = run_reads([answer_body(&two_generation_fragments()).as_bytes()]);

    assert_eq!(snapshot.len(), 2);
    let [first, second] = snapshot.generations() else {
        panic!("expected two generations");
    };
    assert_eq!(first.final_answer(), "BTC is $65000");
    assert_eq!(second.id().value(), first.id().value() + 1);
    assert_eq!(second.thought(), "Check volume");
    assert_eq!(second.final_answer(), "120B");
    assert!(second.is_completed());
}

#[test]
fn unparsable_frame_changes_nothing() {
    let fragments = two_generation_fragments();
    let clean = answer_body(&fragments);

    for garbage in ["<<<not json>>>", "}", "", "[1, 2"] {
        let mut dirty = String::new();
        for (index, fragment) in fragments.iter().enumerate() {
            if index == 3 {
                dirty.push_str(&raw_event("chunk", garbage));
            }
            dirty.push_str(&chunk_event(fragment));
        }

        let (expected, _) = run_reads([clean.as_bytes()]);
        let (snapshot, _) = run_reads([dirty.as_bytes()]);
        assert_eq!(snapshot, expected, "garbage payload {garbage:?}");
    }
}

#[test]
fn frames_without_data_lines_are_skipped() {
    let mut body = String::from("event: ping\n\n");
    body.push_str(&answer_body(&FIRST_GENERATION));
    body.push_str("event: heartbeat\nid: 9\n\n");

    let (snapshot, _) = run_reads([body.as_bytes()]);
    let (expected, _) = run_reads([answer_body(&FIRST_GENERATION).as_bytes()]);
    assert_eq!(snapshot, expected);
}

#[test]
fn truncated_final_payload_is_recovered() {
    let mut body = answer_body(&FIRST_GENERATION[..4]);
    body.push_str(r#"event: chunk
data: {"type":"chunk","path":"answer","content":"Final Answer: BTC is $65"#);

    let (snapshot, _) = run_reads([body.as_bytes()]);
    let generation = &snapshot.generations()[0];
    assert_eq!(generation.final_answer(), "BTC is $65");
    assert!(generation.is_completed());
}

#[test]
fn replay_into_fresh_state_is_identical() {
    let fragments = two_generation_fragments();
    let fold = || {
        let mut state = ParserState::new();
        for fragment in &fragments {
            state.apply(&classify(fragment));
        }
        state
    };
    assert_eq!(fold(), fold());
    assert_eq!(fold().snapshot().len(), 2);
}

#[test]
fn published_snapshots_only_grow() {
    let fragments = [
        "Preface before any marker. ",
        "Thought: Check",
        " price",
        "\nAction: get_",
        "price\n",
        "Observation: 650",
        "00\n",
        "Final Answer: BTC",
        " is up",
        "\nFinal Answer: still up",
        "Thought: again\n",
        "Summary: short",
    ];
    let (_, published) = run_reads([answer_body(&fragments).as_bytes()]);
    assert_eq!(published.len(), fragments.len());

    for pair in published.windows(2) {
        assert_grows(&pair[0], &pair[1]);
    }

    let first = &published.last().unwrap().generations()[0];
    assert_eq!(first.thought(), "Preface before any marker.\nCheck price");
    assert_eq!(first.steps()[0].content(), "get_price\n");
    assert_eq!(first.final_answer(), "BTC is up\nstill up");
}
