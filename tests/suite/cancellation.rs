//! Cancellation stops publication at a fragment boundary and is never an error.

use std::convert::Infallible;
use std::time::Duration;

use agentrace_core::{SnapshotSink, StreamSession};
use agentrace_providers::{CancelToken, StreamOutcome, process_stream};
use agentrace_types::Snapshot;
use futures_util::stream;
use tokio::sync::mpsc;

use crate::common::{answer_body, chunk_event, two_generation_fragments};

/// Records every snapshot and cancels once `limit` have been seen.
struct CancelAfter {
    limit: usize,
    cancel: CancelToken,
    seen: Vec<Snapshot>,
}

impl SnapshotSink for CancelAfter {
    fn publish(&mut self, snapshot: &Snapshot) {
        self.seen.push(snapshot.clone());
        if self.seen.len() == self.limit {
            self.cancel.cancel();
        }
    }
}

async fn cancel_after(limit: usize, reads: Vec<Vec<u8>>) -> (StreamOutcome, Vec<Snapshot>) {
    let cancel = CancelToken::new();
    let sink = CancelAfter {
        limit,
        cancel: cancel.clone(),
        seen: Vec::new(),
    };
    let mut session = StreamSession::new(sink);
    let outcome = process_stream(
        stream::iter(reads.into_iter().map(Ok::<_, Infallible>)),
        &mut session,
        &cancel,
        Duration::from_secs(5),
    )
    .await
    .expect("cancellation is not an error");
    (outcome, session.into_sink().seen)
}

#[tokio::test]
async fn cancel_after_each_fragment_freezes_that_snapshot() {
    let fragments = two_generation_fragments();

    for limit in 1..fragments.len() {
        let reads = fragments
            .iter()
            .map(|fragment| chunk_event(fragment).into_bytes())
            .collect();
        let (outcome, seen) = cancel_after(limit, reads).await;

        assert_eq!(seen.len(), limit, "publishes after cancelling at {limit}");
        let StreamOutcome::Cancelled(snapshot) = outcome else {
            panic!("expected cancellation at {limit}");
        };
        assert_eq!(snapshot, seen[limit - 1]);
    }
}

#[tokio::test]
async fn cancel_mid_read_skips_remaining_frames() {
    let body = answer_body(&two_generation_fragments());
    let (outcome, seen) = cancel_after(3, vec![body.into_bytes()]).await;

    assert_eq!(seen.len(), 3);
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.snapshot(), &seen[2]);
    assert!(outcome.snapshot().generations()[0].final_answer().is_empty());
}

#[tokio::test]
async fn read_resolving_after_cancel_is_discarded() {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(4);
    let reads = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|bytes| (Ok::<_, Infallible>(bytes), rx))
    });

    let cancel = CancelToken::new();
    let mut published = Vec::new();
    let mut session = StreamSession::new(|snapshot: &Snapshot| published.push(snapshot.clone()));

    // The second event stays buffered until a later separator completes it.
    let first_read = chunk_event("Thought: first\n") + &chunk_event("Action: pending\n");

    let driver = async {
        tx.send(first_read.into_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tx.send(chunk_event("Action: late\n").into_bytes())
            .await
            .unwrap();
        drop(tx);
    };

    let (outcome, ()) = tokio::join!(
        process_stream(reads, &mut session, &cancel, Duration::from_secs(5)),
        driver
    );
    let outcome = outcome.unwrap();
    drop(session);

    assert!(outcome.is_cancelled());
    assert_eq!(published.len(), 1);
    let generation = &outcome.snapshot().generations()[0];
    assert_eq!(generation.thought(), "first");
    assert!(generation.steps().is_empty());
}
