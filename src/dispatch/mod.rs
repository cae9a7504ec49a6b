//! Dispatch loop: the notification-mode main control loop.
//!
//! Wires the [`crate::queue::QueueAdapter`], [`WorkerPool`], and completion
//! channel together: poll up to `free_count()` tasks per iteration, spawn
//! one notification worker per task, drain verdicts, sleep.

pub mod completion;
pub mod notify;
pub mod worker_pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, info};

use crate::error::DispatchError;
use crate::queue::{QueueAdapter, Verdict};

pub use completion::{completion_channel, CompletionReceiver, CompletionSender};
pub use worker_pool::WorkerPool;

use notify::notification_worker;

/// Tunables the dispatch loop needs that come straight from configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTuning {
    /// Per-`take` lease-wait.
    pub take_timeout: Duration,
    /// Inter-iteration sleep.
    pub sleep: Duration,
}

/// The notification-mode dispatch loop.
pub struct DispatchLoop {
    queue: Arc<dyn QueueAdapter>,
    pool: WorkerPool,
    completion_tx: CompletionSender,
    completion_rx: CompletionReceiver,
    http_client: reqwest::Client,
    run_flag: Arc<AtomicBool>,
    tuning: DispatchTuning,
}

impl DispatchLoop {
    /// Build a dispatch loop against `queue`, with a worker pool of
    /// `capacity` and a completion channel bounded the same way.
    #[must_use]
    pub fn new(
        queue: Arc<dyn QueueAdapter>,
        capacity: usize,
        http_client: reqwest::Client,
        run_flag: Arc<AtomicBool>,
        tuning: DispatchTuning,
    ) -> Self {
        let (completion_tx, completion_rx) = completion_channel(capacity);
        Self {
            queue,
            pool: WorkerPool::new(capacity),
            completion_tx,
            completion_rx,
            http_client,
            run_flag,
            tuning,
        }
    }

    /// Run the loop until the run flag flips to `false`.
    ///
    /// A `take` failure propagates as a [`DispatchError`] rather than
    /// being handled here: the supervisor treats any escaping error as a
    /// dispatch-loop crash and restarts after a cooldown. Everything else
    /// (HTTP failures, ack/bury failures) is caught and logged well
    /// before it could reach this level.
    pub async fn run(mut self) -> Result<(), DispatchError> {
        while self.run_flag.load(Ordering::Relaxed) {
            self.poll_and_spawn().await?;
            self.reap_completions().await;
            self.sleep_interruptible().await;
        }
        info!("stop application loop");
        Ok(())
    }

    async fn poll_and_spawn(&mut self) -> Result<(), DispatchError> {
        let free = self.pool.free_count();
        for _ in 0..free {
            match self.queue.take(self.tuning.take_timeout).await? {
                Some(task) => {
                    let tx = self.completion_tx.clone();
                    let client = self.http_client.clone();
                    self.pool.add(async move {
                        notification_worker(task, tx, client).await;
                    });
                }
                // Queue reports empty now; spend the rest of this
                // iteration draining and sleeping instead of spinning.
                None => break,
            }
        }
        Ok(())
    }

    /// Drain the completion channel, applying `ack`/`bury` to the queue
    /// for each verdict. Queue failures here are logged and swallowed —
    /// a lost ack becomes a redelivered task once the broker's lease
    /// expires, which is an acceptable outcome under at-least-once
    /// delivery.
    async fn reap_completions(&mut self) {
        loop {
            match self.completion_rx.try_recv() {
                Ok((task, verdict)) => {
                    let result = match verdict {
                        Verdict::Ack => self.queue.ack(&task).await,
                        Verdict::Bury => self.queue.bury(&task).await,
                    };
                    if let Err(err) = result {
                        error!(task_id = task.id, error = %err, "failed to apply verdict, task will be redelivered on lease expiry");
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Sleep for the configured interval in short chunks so a stop signal
    /// flipping the run flag mid-sleep is observed promptly rather than
    /// only at the next iteration boundary.
    async fn sleep_interruptible(&self) {
        const POLL_INTERVAL: Duration = Duration::from_millis(100);
        let mut remaining = self.tuning.sleep;
        while remaining > Duration::ZERO && self.run_flag.load(Ordering::Relaxed) {
            let step = remaining.min(POLL_INTERVAL);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueueAdapter;
    use serde_json::{json, Map};
    use std::sync::atomic::AtomicBool;

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_queue_spawns_no_workers_and_stops_after_one_iteration() {
        let queue: Arc<dyn QueueAdapter> = Arc::new(InMemoryQueueAdapter::new());
        let run_flag = Arc::new(AtomicBool::new(true));
        let loop_run_flag = run_flag.clone();

        let tuning = DispatchTuning {
            take_timeout: Duration::from_millis(10),
            sleep: Duration::from_millis(10),
        };
        let mut dispatch = DispatchLoop::new(queue, 5, client(), loop_run_flag, tuning);

        dispatch.poll_and_spawn().await.unwrap();
        assert_eq!(dispatch.pool.live_count(), 0);

        run_flag.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn bury_path_applies_verdict_to_the_queue() {
        let queue = Arc::new(InMemoryQueueAdapter::new());
        let mut data = Map::new();
        // Port 0 never has a listener, so the worker's POST fails at the
        // transport layer and posts a bury verdict; this only exercises
        // the bury branch. See `ack_path_applies_verdict_to_the_queue`
        // below for a genuine ack-path assertion.
        data.insert("callback_url".into(), json!("http://127.0.0.1:0/"));
        queue.seed(data, crate::queue::Priority::Normal).await;

        let run_flag = Arc::new(AtomicBool::new(true));
        let tuning = DispatchTuning {
            take_timeout: Duration::from_millis(50),
            sleep: Duration::from_millis(10),
        };
        let mut dispatch = DispatchLoop::new(queue.clone(), 5, client(), run_flag, tuning);

        dispatch.poll_and_spawn().await.unwrap();
        assert_eq!(dispatch.pool.live_count(), 1);

        // Give the worker time to fail its connection and post a bury verdict.
        tokio::time::sleep(Duration::from_millis(200)).await;
        dispatch.reap_completions().await;

        assert_eq!(queue.leased_count().await, 0);
    }

    /// Binds a loopback listener that answers the first request it receives
    /// with a bare `204 No Content` and returns its `http://` base URL.
    async fn spawn_ok_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0_u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn ack_path_applies_verdict_to_the_queue() {
        let queue = Arc::new(InMemoryQueueAdapter::new());
        let mut data = Map::new();
        data.insert("callback_url".into(), json!(spawn_ok_server().await));
        queue.seed(data, crate::queue::Priority::Normal).await;

        let run_flag = Arc::new(AtomicBool::new(true));
        let tuning = DispatchTuning {
            take_timeout: Duration::from_millis(50),
            sleep: Duration::from_millis(10),
        };
        let mut dispatch = DispatchLoop::new(queue.clone(), 5, client(), run_flag, tuning);

        dispatch.poll_and_spawn().await.unwrap();
        assert_eq!(dispatch.pool.live_count(), 1);

        // Give the worker time to complete its POST and post an ack verdict.
        tokio::time::sleep(Duration::from_millis(200)).await;
        dispatch.reap_completions().await;

        assert_eq!(queue.leased_count().await, 0);
        assert_eq!(queue.pending_count().await, 0);
    }
}
