//! Integration test: the dispatch loop runs end to end against an
//! in-memory queue, and shuts down cleanly once the run flag flips false.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatchd::dispatch::notify::build_http_client;
use dispatchd::dispatch::{DispatchLoop, DispatchTuning};
use dispatchd::queue::{InMemoryQueueAdapter, Priority, QueueAdapter};
use serde_json::{json, Map};

#[tokio::test]
async fn dispatch_loop_drains_seeded_tasks_and_stops_on_signal() {
    let queue = Arc::new(InMemoryQueueAdapter::new());
    for _ in 0..3 {
        let mut data = Map::new();
        // Port 0 never has a listener: every delivery attempt fails fast
        // at the transport layer and buries, which is enough to exercise
        // the full take -> spawn -> complete -> reap path.
        data.insert("callback_url".to_string(), json!("http://127.0.0.1:0/"));
        queue.seed(data, Priority::Normal).await;
    }

    let run_flag = Arc::new(AtomicBool::new(true));
    let stopper = run_flag.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stopper.store(false, Ordering::Relaxed);
    });

    let client = build_http_client(Duration::from_millis(100), Duration::from_millis(100), true).unwrap();
    let tuning = DispatchTuning {
        take_timeout: Duration::from_millis(20),
        sleep: Duration::from_millis(20),
    };
    let dispatch = DispatchLoop::new(queue.clone(), 4, client, run_flag, tuning);

    dispatch.run().await.unwrap();

    assert_eq!(queue.leased_count().await, 0);
    assert_eq!(queue.pending_count().await, 0);
}
