//! End-to-end runs against a mock upstream.

use std::time::Duration;

use agentrace_providers::{StreamUpdate, Submitter, Updates, spawn_answer, update_channel};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    RUN_PATH, answer_body, api_config, assert_grows, generation_event, mount_stream,
    start_upstream_mock, two_generation_fragments,
};

async fn collect(mut rx: Updates) -> Vec<StreamUpdate> {
    let mut updates = Vec::new();
    while let Some(update) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("update within timeout")
    {
        let terminal = update.is_terminal();
        updates.push(update);
        if terminal {
            break;
        }
    }
    updates
}

#[tokio::test]
async fn streams_two_generations_through_channel() {
    let server = start_upstream_mock().await;
    let fragments = two_generation_fragments();
    let mut body = generation_event("start");
    body.push_str(&answer_body(&fragments));
    body.push_str(&generation_event("end"));
    mount_stream(&server, body).await;

    let (tx, rx) = update_channel();
    let submission = spawn_answer(api_config(&server), "BTC?".to_string(), tx);
    let updates = collect(rx).await;
    submission.join().await;

    let (last, progress) = updates.split_last().unwrap();
    let StreamUpdate::Completed(final_snapshot) = last else {
        panic!("expected completion, got {last:?}");
    };
    assert_eq!(final_snapshot.len(), 2);
    assert_eq!(final_snapshot.generations()[1].final_answer(), "120B");

    let snapshots: Vec<_> = progress
        .iter()
        .map(|update| match update {
            StreamUpdate::Snapshot(snapshot) => snapshot,
            other => panic!("unexpected update {other:?}"),
        })
        .collect();
    assert!(!snapshots.is_empty());
    assert!(snapshots.len() <= fragments.len());
    for pair in snapshots.windows(2) {
        assert_grows(pair[0], pair[1]);
    }
    assert_eq!(*snapshots[snapshots.len() - 1], *final_snapshot);
}

#[tokio::test]
async fn unread_snapshots_do_not_pile_up() {
    let server = start_upstream_mock().await;
    let mut fragments = vec!["Thought: ".to_string()];
    fragments.extend((0..500).map(|i| format!("{i} ")));
    fragments.push("\nFinal Answer: done".to_string());
    let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
    mount_stream(&server, answer_body(&fragments)).await;

    let (tx, rx) = update_channel();
    let submission = spawn_answer(api_config(&server), "q".to_string(), tx);
    submission.join().await;

    let updates = collect(rx).await;
    let [StreamUpdate::Snapshot(latest), StreamUpdate::Completed(final_snapshot)] =
        updates.as_slice()
    else {
        panic!("expected one snapshot and completion, got {} updates", updates.len());
    };
    assert_eq!(latest, final_snapshot);
    assert_eq!(final_snapshot.generations()[0].final_answer(), "done");
}

#[tokio::test]
async fn request_carries_question_version_and_key() {
    let server = start_upstream_mock().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(header("authorization", "Bearer ww-test"))
        .and(body_partial_json(
            json!({"inputs": {"question": "What is BTC?"}, "version": "^9.9"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(answer_body(&["Final Answer: ok"])))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, rx) = update_channel();
    let config = api_config(&server).with_version("^9.9");
    spawn_answer(config, "What is BTC?".to_string(), tx);
    let updates = collect(rx).await;
    assert!(matches!(updates.last(), Some(StreamUpdate::Completed(_))));
}

#[tokio::test]
async fn upstream_error_status_fails_the_submission() {
    let server = start_upstream_mock().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (tx, rx) = update_channel();
    spawn_answer(api_config(&server), "q".to_string(), tx);
    let updates = collect(rx).await;

    assert_eq!(
        updates,
        vec![StreamUpdate::Failed(
            "upstream responded with status 500: boom".to_string()
        )]
    );
}

#[tokio::test]
async fn oversized_error_body_is_truncated() {
    let server = start_upstream_mock().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(40 * 1024)))
        .mount(&server)
        .await;

    let (tx, rx) = update_channel();
    spawn_answer(api_config(&server), "q".to_string(), tx);
    let updates = collect(rx).await;

    let Some(StreamUpdate::Failed(message)) = updates.last() else {
        panic!("expected failure, got {updates:?}");
    };
    assert!(message.ends_with("...(truncated)"));
    assert!(message.len() < 33 * 1024);
}

#[tokio::test]
async fn new_submission_cancels_the_previous_one() {
    let server = start_upstream_mock().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"inputs": {"question": "slow"}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(answer_body(&["Thought: slow\n"]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"inputs": {"question": "fast"}})))
        .respond_with(ResponseTemplate::new(200).set_body_string(answer_body(&["Final Answer: fast"])))
        .mount(&server)
        .await;

    let mut submitter = Submitter::new();
    let first = submitter.submit(api_config(&server), "slow".to_string());
    let second = submitter.submit(api_config(&server), "fast".to_string());
    assert!(submitter.active().is_some());

    let first_updates = collect(first).await;
    assert_eq!(first_updates, vec![StreamUpdate::Cancelled]);

    let second_updates = collect(second).await;
    let Some(StreamUpdate::Completed(snapshot)) = second_updates.last() else {
        panic!("expected completion, got {second_updates:?}");
    };
    assert_eq!(snapshot.generations()[0].final_answer(), "fast");
}
