//! Task-based submissions that forward snapshots to a consumer.
//!
//! [`spawn_answer`] runs one request on its own task. The consumer reads
//! [`StreamUpdate`]s from [`Updates`]: zero or more snapshots, then exactly one
//! terminal update. Snapshots travel over a `watch` channel, so a slow consumer
//! only ever holds the latest state and skips the ones it missed. [`Submitter`]
//! keeps at most one submission alive by cancelling the previous one before
//! starting the next.

use agentrace_core::SnapshotSink;
use agentrace_types::Snapshot;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::{ApiConfig, CancelToken, StreamOutcome, stream_answer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Full state after the latest applied fragment.
    Snapshot(Snapshot),
    /// The stream ended normally; carries the final state.
    Completed(Snapshot),
    /// The submission was cancelled. The last `Snapshot` update stays current.
    Cancelled,
    /// Transport-level failure.
    Failed(String),
}

impl StreamUpdate {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }
}

/// Create the channel pair a submission reports through.
#[must_use]
pub fn update_channel() -> (UpdateSender, Updates) {
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
    let (terminal_tx, terminal_rx) = oneshot::channel();
    (
        UpdateSender {
            snapshots: snapshot_tx,
            terminal: terminal_tx,
        },
        Updates {
            snapshots: snapshot_rx,
            terminal: Some(terminal_rx),
        },
    )
}

/// Producer half of [`update_channel`].
#[derive(Debug)]
pub struct UpdateSender {
    snapshots: watch::Sender<Snapshot>,
    terminal: oneshot::Sender<StreamUpdate>,
}

/// Consumer half of [`update_channel`].
#[derive(Debug)]
pub struct Updates {
    snapshots: watch::Receiver<Snapshot>,
    terminal: Option<oneshot::Receiver<StreamUpdate>>,
}

impl Updates {
    /// Next update, or `None` once the terminal update has been taken or the
    /// producer went away without sending one.
    ///
    /// An unseen snapshot is always returned before the terminal update.
    /// Cancel-safe, so it can sit in a `tokio::select!` loop.
    pub async fn recv(&mut self) -> Option<StreamUpdate> {
        let terminal = self.terminal.as_mut()?;
        let finished = tokio::select! {
            biased;
            Ok(()) = self.snapshots.changed() => None,
            result = terminal => Some(result.ok()),
        };

        match finished {
            None => Some(StreamUpdate::Snapshot(
                self.snapshots.borrow_and_update().clone(),
            )),
            Some(update) => {
                self.terminal = None;
                update
            }
        }
    }

    /// Most recent snapshot, whether or not it was already returned by `recv`.
    #[must_use]
    pub fn latest(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }
}

/// Replaces the watched snapshot until the token is cancelled.
#[derive(Debug)]
pub struct ChannelSink {
    tx: watch::Sender<Snapshot>,
    cancel: CancelToken,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: watch::Sender<Snapshot>, cancel: CancelToken) -> Self {
        Self { tx, cancel }
    }
}

impl SnapshotSink for ChannelSink {
    fn publish(&mut self, snapshot: &Snapshot) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.tx.send(snapshot.clone()).is_err() {
            // Receiver dropped; nobody is listening anymore.
            self.cancel.cancel();
        }
    }
}

/// Handle to a running submission.
#[derive(Debug)]
pub struct Submission {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

impl Submission {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to send its terminal update.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(%e, "Submission task failed");
        }
    }
}

/// Start a request on a new task, reporting through `tx`.
pub fn spawn_answer(
    config: ApiConfig,
    question: String,
    tx: UpdateSender,
) -> Submission {
    let cancel = CancelToken::new();
    let task_cancel = cancel.clone();
    let UpdateSender {
        snapshots,
        terminal,
    } = tx;

    let handle = tokio::spawn(async move {
        let sink = ChannelSink::new(snapshots, task_cancel.clone());
        let update = match stream_answer(&config, &question, sink, &task_cancel).await {
            Ok(StreamOutcome::Completed(snapshot)) => StreamUpdate::Completed(snapshot),
            Ok(StreamOutcome::Cancelled(_)) => StreamUpdate::Cancelled,
            Err(_) if task_cancel.is_cancelled() => StreamUpdate::Cancelled,
            Err(e) => {
                tracing::warn!(%e, "Stream failed");
                StreamUpdate::Failed(e.to_string())
            }
        };
        let _ = terminal.send(update);
    });

    Submission { cancel, handle }
}

/// Owns the in-flight submission for one consumer.
#[derive(Debug, Default)]
pub struct Submitter {
    active: Option<Submission>,
}

impl Submitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is in flight, then start a new submission.
    pub fn submit(
        &mut self,
        config: ApiConfig,
        question: String,
    ) -> Updates {
        self.cancel();
        let (tx, rx) = update_channel();
        self.active = Some(spawn_answer(config, question, tx));
        rx
    }

    pub fn cancel(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<&Submission> {
        self.active.as_ref()
    }
}
