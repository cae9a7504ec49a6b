//! Fixed-capacity cooperative worker pool.
//!
//! Every task here costs exactly one slot, so a `tokio::task::JoinSet`
//! carries the bookkeeping directly instead of hand-rolled atomics: the
//! set's length is the live-worker count.

use std::future::Future;

use tokio::task::JoinSet;

/// A fixed-size pool of concurrently running worker futures.
///
/// `free_count` reaps finished workers before reporting, so it never
/// under-counts capacity freed up by workers that completed since the
/// last call.
pub struct WorkerPool {
    capacity: usize,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    /// Create a pool with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tasks: JoinSet::new(),
        }
    }

    /// Configured capacity (`WORKER_POOL_SIZE`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots not currently occupied by a live worker.
    ///
    /// Reaps completed workers first, so this reflects the pool's current
    /// state rather than a stale high-water mark.
    pub fn free_count(&mut self) -> usize {
        while self.tasks.try_join_next().is_some() {}
        self.capacity.saturating_sub(self.tasks.len())
    }

    /// Register a started worker. Its slot is held until the future
    /// completes (panics count as completion too, via `JoinSet`'s own
    /// panic propagation on the next `try_join_next`/`join_next`).
    pub fn add<F>(&mut self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(worker);
    }

    /// Number of workers currently live, without reaping first.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.tasks.len()
    }
}
