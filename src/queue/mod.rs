//! Queue broker adapters.
//!
//! The dispatch core never talks to a specific broker; it talks to
//! whatever implements [`QueueAdapter`]: a lease-based `take`/`ack`/`bury`/
//! `put` contract the notification and URL-check daemons are both built on.

pub mod memory;
pub mod task;
pub mod tcp;

pub use memory::InMemoryQueueAdapter;
pub use task::{Priority, Task, TaskId, TaskMeta, Verdict};
pub use tcp::TcpQueueAdapter;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::QueueError;

/// Capability set a queue broker must expose: lease a task, acknowledge or
/// bury it, and enqueue a new one.
///
/// Implementations must be safe to share across the worker pool: `take` is
/// called serially by the dispatch loop, but `ack`/`bury`/`put` may be
/// invoked by the reaper while another `take` is in flight against the
/// same adapter instance (a single adapter instance is still only ever
/// driven by one dispatch loop, so this is `Send + Sync` for the spawner's
/// sake rather than for true concurrent access).
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Lease the next ready task, waiting up to `timeout` for one to
    /// appear. Returns `None` if the queue was empty for the whole wait.
    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError>;

    /// Acknowledge successful processing of a leased task.
    async fn ack(&self, task: &Task) -> Result<(), QueueError>;

    /// Bury a leased task that failed processing.
    async fn bury(&self, task: &Task) -> Result<(), QueueError>;

    /// Enqueue a new task, optionally delayed, at the given priority.
    async fn put(
        &self,
        data: Map<String, Value>,
        delay: Option<Duration>,
        pri: Priority,
    ) -> Result<(), QueueError>;
}
