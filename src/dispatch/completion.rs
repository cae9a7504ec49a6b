//! Completion channel: the bounded mailbox workers post verdicts into.

use tokio::sync::mpsc;

use crate::queue::{Task, Verdict};

/// Sending half of the completion channel, cloned into each notification worker.
pub type CompletionSender = mpsc::Sender<(Task, Verdict)>;

/// Receiving half of the completion channel, owned by the dispatch loop.
pub type CompletionReceiver = mpsc::Receiver<(Task, Verdict)>;

/// Build a completion channel bounded at `capacity`.
///
/// A bound equal to the worker pool's capacity is sufficient: every
/// in-flight worker can post at most one verdict, so the channel can never
/// need to hold more entries than there are live workers.
#[must_use]
pub fn completion_channel(capacity: usize) -> (CompletionSender, CompletionReceiver) {
    mpsc::channel(capacity.max(1))
}
