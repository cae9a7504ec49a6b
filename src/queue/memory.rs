//! In-memory queue adapter with priority ordering and task leases.
//!
//! A `BinaryHeap`-backed priority/FIFO queue extended with the lease-based
//! contract the dispatch core needs: `take` moves a task out of the ready
//! heap and into a leased set; `ack`/`bury` clear the lease; `put` accepts
//! an optional delay, used by the URL-check worker's recheck path.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::QueueError;
use crate::queue::{Priority, QueueAdapter, Task, TaskId, TaskMeta};

struct PendingTask {
    task: Task,
    ready_at: Instant,
    seq: u64,
}

impl PendingTask {
    fn priority_rank(p: Priority) -> u8 {
        match p {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }
}

impl PartialEq for PendingTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.id == other.task.id
    }
}

impl Eq for PendingTask {}

impl PartialOrd for PendingTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingTask {
    fn cmp(&self, other: &Self) -> Ordering {
        let self_pri = Self::priority_rank(self.task.meta.priority);
        let other_pri = Self::priority_rank(other.task.meta.priority);
        match self_pri.cmp(&other_pri) {
            // Earlier-enqueued task wins within the same priority (max-heap, so reverse seq).
            Ordering::Equal => other.seq.cmp(&self.seq),
            order => order,
        }
    }
}

struct State {
    pending: BinaryHeap<PendingTask>,
    leased: HashMap<TaskId, Task>,
}

/// A single-process, priority-ordered queue adapter backed by a
/// `BinaryHeap`, intended for tests and for running the daemon against a
/// synthetic broker.
pub struct InMemoryQueueAdapter {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl InMemoryQueueAdapter {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: BinaryHeap::new(),
                leased: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed the queue with a task at the given priority, for test setup.
    pub async fn seed(&self, data: Map<String, Value>, pri: Priority) -> TaskId {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let task = Task {
            id,
            data,
            meta: TaskMeta { priority: pri },
        };
        let seq = id;
        let mut state = self.state.lock().await;
        state.pending.push(PendingTask {
            task,
            ready_at: Instant::now(),
            seq,
        });
        id
    }

    /// Number of leased (in-flight) tasks, for assertions in tests.
    pub async fn leased_count(&self) -> usize {
        self.state.lock().await.leased.len()
    }

    /// Number of tasks ready or waiting in the queue, for assertions in tests.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    async fn pop_ready(&self) -> Option<Task> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if state.pending.peek().is_some_and(|t| t.ready_at <= now) {
            let pending = state.pending.pop().expect("peek confirmed a head element");
            state.leased.insert(pending.task.id, pending.task.clone());
            return Some(pending.task);
        }
        None
    }
}

impl Default for InMemoryQueueAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueAdapter for InMemoryQueueAdapter {
    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError> {
        if let Some(task) = self.pop_ready().await {
            return Ok(Some(task));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Poll at a short interval rather than computing the exact
            // next-ready instant: keeps this adapter simple and still
            // bounded by `timeout`.
            sleep(Duration::from_millis(20).min(deadline - now)).await;
            if let Some(task) = self.pop_ready().await {
                return Ok(Some(task));
            }
        }
    }

    async fn ack(&self, task: &Task) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .leased
            .remove(&task.id)
            .ok_or_else(|| QueueError::Rejected(format!("task {} is not leased", task.id)))?;
        Ok(())
    }

    async fn bury(&self, task: &Task) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .leased
            .remove(&task.id)
            .ok_or_else(|| QueueError::Rejected(format!("task {} is not leased", task.id)))?;
        Ok(())
    }

    async fn put(
        &self,
        data: Map<String, Value>,
        delay: Option<Duration>,
        pri: Priority,
    ) -> Result<(), QueueError> {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let task = Task {
            id,
            data,
            meta: TaskMeta { priority: pri },
        };
        let ready_at = Instant::now() + delay.unwrap_or_default();
        let mut state = self.state.lock().await;
        state.pending.push(PendingTask {
            task,
            ready_at,
            seq: id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn take_returns_none_on_empty_queue() {
        let q = InMemoryQueueAdapter::new();
        let got = q.take(Duration::from_millis(30)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn take_orders_by_priority_then_fifo() {
        let q = InMemoryQueueAdapter::new();
        q.seed(obj(&[("n", json!(1))]), Priority::Low).await;
        q.seed(obj(&[("n", json!(2))]), Priority::Critical).await;
        q.seed(obj(&[("n", json!(3))]), Priority::Normal).await;

        let first = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(first.data["n"], json!(2));
        let second = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(second.data["n"], json!(3));
        let third = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(third.data["n"], json!(1));
    }

    #[tokio::test]
    async fn ack_clears_the_lease() {
        let q = InMemoryQueueAdapter::new();
        q.seed(obj(&[]), Priority::Normal).await;
        let task = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(q.leased_count().await, 1);
        q.ack(&task).await.unwrap();
        assert_eq!(q.leased_count().await, 0);
    }

    #[tokio::test]
    async fn bury_clears_the_lease() {
        let q = InMemoryQueueAdapter::new();
        q.seed(obj(&[]), Priority::Normal).await;
        let task = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        q.bury(&task).await.unwrap();
        assert_eq!(q.leased_count().await, 0);
    }

    #[tokio::test]
    async fn put_with_delay_is_not_immediately_ready() {
        let q = InMemoryQueueAdapter::new();
        q.put(obj(&[]), Some(Duration::from_millis(200)), Priority::Normal)
            .await
            .unwrap();
        let immediate = q.take(Duration::from_millis(30)).await.unwrap();
        assert!(immediate.is_none());
        let delayed = q.take(Duration::from_millis(400)).await.unwrap();
        assert!(delayed.is_some());
    }
}
