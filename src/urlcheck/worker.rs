//! URL-check worker loop: takes one task from the inbound queue, resolves
//! its redirect chain, and routes the result to either a recheck re-enqueue
//! (same queue, delayed) or the outbound result queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::QueueError;
use crate::queue::{Priority, QueueAdapter, Task};
use crate::urlcheck::analyzer::{normalize_url, RedirectAnalyzer, RedirectHistory};

/// Tunables the URL-check worker needs from configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTuning {
    /// Per-`take` lease-wait on the inbound queue.
    pub take_timeout: Duration,
    /// Delay applied when a task is re-enqueued for a recheck.
    pub recheck_delay: Duration,
    /// Inter-iteration sleep between leases, mirroring the dispatch loop's
    /// own `SLEEP` tunable.
    pub sleep: Duration,
}

enum Routing {
    Recheck(Map<String, Value>),
    Normal(Map<String, Value>),
}

/// Run one iteration: lease a task, analyze its URL, route the outcome,
/// ack. Returns once the iteration completes, whether or not a task was
/// available, so the caller drives the repeat-until-stopped loop.
///
/// A `take` failure propagates to the caller exactly as the dispatch
/// loop's does: the supervisor treats it as a crash of this loop and
/// restarts after a cooldown. `ack` failures, like `put` failures on the
/// recheck/output side, are logged and swallowed — the broker's own
/// lease expiry is the fallback safety net.
pub async fn run_once(
    in_queue: &dyn QueueAdapter,
    out_queue: &dyn QueueAdapter,
    analyzer: &dyn RedirectAnalyzer,
    tuning: WorkerTuning,
) -> Result<(), QueueError> {
    let Some(task) = in_queue.take(tuning.take_timeout).await? else {
        return Ok(());
    };

    let routing = route(&task, analyzer).await;

    match routing {
        Some(Routing::Recheck(data)) => {
            if let Err(err) = in_queue.put(data, Some(tuning.recheck_delay), task.meta.priority).await {
                error!(task_id = task.id, error = %err, "failed to re-enqueue task for recheck");
            }
        }
        Some(Routing::Normal(data)) => {
            if let Err(err) = out_queue.put(data, None, Priority::Normal).await {
                error!(task_id = task.id, error = %err, "failed to enqueue url-check result");
            }
        }
        None => {}
    }

    if let Err(err) = in_queue.ack(&task).await {
        error!(task_id = task.id, error = %err, "failed to ack url-check task");
    }
    Ok(())
}

/// Drive [`run_once`] repeatedly while `run_flag` is set, sleeping
/// `tuning.sleep` between iterations. Mirrors the dispatch loop's own
/// "poll, act, sleep" contract (`spec.md` §4.4) for the single-task
/// URL-check routine; a `take` failure propagates so the supervisor can
/// restart this loop after a cooldown, the same as the notification
/// daemon's dispatch loop.
pub async fn run_loop(
    run_flag: &Arc<AtomicBool>,
    in_queue: &dyn QueueAdapter,
    out_queue: &dyn QueueAdapter,
    analyzer: &dyn RedirectAnalyzer,
    tuning: WorkerTuning,
) -> Result<(), QueueError> {
    while run_flag.load(Ordering::Relaxed) {
        run_once(in_queue, out_queue, analyzer, tuning).await?;
        sleep_interruptible(tuning.sleep, run_flag).await;
    }
    info!("stop application loop");
    Ok(())
}

async fn sleep_interruptible(duration: Duration, run_flag: &Arc<AtomicBool>) {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && run_flag.load(Ordering::Relaxed) {
        let step = remaining.min(POLL_INTERVAL);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}

async fn route(task: &Task, analyzer: &dyn RedirectAnalyzer) -> Option<Routing> {
    let Some(url) = task.data_str("url") else {
        warn!(task_id = task.id, "url-check task has no url field, skipping analysis");
        return None;
    };
    let normalized = normalize_url(url);
    let recheck = task.data_bool("recheck");

    let history = analyzer.analyze(&normalized).await?;
    Some(classify(task, &history, recheck))
}

/// A chain containing at least one `"ERROR"` hop, on a task not already a
/// recheck attempt, goes back onto the inbound queue with `recheck` flipped
/// to `true` and every other field of the original payload preserved —
/// including fields the worker itself never looks at, such as
/// `suspicious` — so a second pass sees the same context the first pass
/// did. Anything else produces a fresh result payload carrying only
/// `url_id`, `result`, `check_type`, and `suspicious` if present; `url`
/// and `recheck` are deliberately not carried into this payload.
fn classify(task: &Task, history: &RedirectHistory, recheck: bool) -> Routing {
    let has_error = history.types.iter().any(|t| t == "ERROR");

    if has_error && !recheck {
        let mut data = task.data.clone();
        data.insert("recheck".to_string(), Value::Bool(true));
        return Routing::Recheck(data);
    }

    let mut data = Map::new();
    if let Some(url_id) = task.data.get("url_id") {
        data.insert("url_id".to_string(), url_id.clone());
    }
    data.insert(
        "result".to_string(),
        Value::Array(vec![
            Value::Array(history.types.iter().cloned().map(Value::String).collect()),
            Value::Array(history.urls.iter().cloned().map(Value::String).collect()),
            Value::Array(history.counters.iter().cloned().map(Value::String).collect()),
        ]),
    );
    data.insert("check_type".to_string(), Value::String("normal".to_string()));
    if let Some(suspicious) = task.data.get("suspicious") {
        data.insert("suspicious".to_string(), suspicious.clone());
    }
    Routing::Normal(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueueAdapter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubAnalyzer(Mutex<Option<RedirectHistory>>);

    #[async_trait]
    impl RedirectAnalyzer for StubAnalyzer {
        async fn analyze(&self, _url: &str) -> Option<RedirectHistory> {
            self.0.lock().unwrap().clone()
        }
    }

    fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn tuning() -> WorkerTuning {
        WorkerTuning {
            take_timeout: Duration::from_millis(30),
            recheck_delay: Duration::from_millis(1),
            sleep: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn no_task_returns_without_touching_either_queue() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        let analyzer = StubAnalyzer(Mutex::new(None));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        assert_eq!(out_q.pending_count().await, 0);
        assert_eq!(in_q.pending_count().await, 0);
    }

    #[tokio::test]
    async fn unresolved_chain_reenqueues_as_recheck_preserving_extra_fields() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        in_q.seed(
            obj(&[
                ("url", json!("http://example.test/")),
                ("url_id", json!(42)),
                ("suspicious", json!(true)),
            ]),
            Priority::Normal,
        )
        .await;
        let analyzer = StubAnalyzer(Mutex::new(Some(RedirectHistory {
            types: vec!["ERROR".to_string()],
            urls: vec!["http://example.test/".to_string()],
            counters: vec![],
        })));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        assert_eq!(out_q.pending_count().await, 0);
        let requeued = in_q.take(Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(requeued.data["recheck"], json!(true));
        assert_eq!(requeued.data["url_id"], json!(42));
        assert_eq!(requeued.data["suspicious"], json!(true));
        assert_eq!(requeued.data["url"], json!("http://example.test/"));
    }

    #[tokio::test]
    async fn chain_containing_an_error_hop_among_others_reenqueues_as_recheck() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        in_q.seed(
            obj(&[("url", json!("www.x")), ("url_id", json!(666))]),
            Priority::High,
        )
        .await;
        let analyzer = StubAnalyzer(Mutex::new(Some(RedirectHistory {
            types: vec!["ERROR".to_string(), "APPLE".to_string()],
            urls: vec!["www.x".to_string()],
            counters: vec![],
        })));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        assert_eq!(out_q.pending_count().await, 0);
        let requeued = in_q.take(Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(requeued.data["recheck"], json!(true));
        assert_eq!(requeued.meta.priority, Priority::High);
    }

    #[tokio::test]
    async fn already_rechecked_task_with_unresolved_chain_routes_normal() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        in_q.seed(
            obj(&[("url", json!("http://example.test/")), ("recheck", json!(true))]),
            Priority::Normal,
        )
        .await;
        let analyzer = StubAnalyzer(Mutex::new(Some(RedirectHistory {
            types: vec!["ERROR".to_string()],
            urls: vec!["http://example.test/".to_string()],
            counters: vec![],
        })));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        assert_eq!(in_q.pending_count().await, 0);
        assert_eq!(out_q.pending_count().await, 1);
    }

    #[tokio::test]
    async fn resolved_chain_produces_a_fresh_result_payload() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        in_q.seed(
            obj(&[
                ("url", json!("http://example.test/")),
                ("url_id", json!(7)),
            ]),
            Priority::Normal,
        )
        .await;
        let analyzer = StubAnalyzer(Mutex::new(Some(RedirectHistory {
            types: vec!["FINAL".to_string()],
            urls: vec!["http://example.test/".to_string()],
            counters: vec![],
        })));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        let result = out_q.take(Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(result.data["url_id"], json!(7));
        assert_eq!(result.data["check_type"], json!("normal"));
        assert!(result.data.get("url").is_none());
        assert!(result.data.get("recheck").is_none());
    }

    #[tokio::test]
    async fn no_classification_still_acks_without_enqueuing() {
        let in_q = InMemoryQueueAdapter::new();
        let out_q = InMemoryQueueAdapter::new();
        in_q.seed(obj(&[("url", json!("http://example.test/"))]), Priority::Normal)
            .await;
        let analyzer = StubAnalyzer(Mutex::new(None));

        run_once(&in_q, &out_q, &analyzer, tuning()).await.unwrap();

        assert_eq!(in_q.leased_count().await, 0);
        assert_eq!(in_q.pending_count().await, 0);
        assert_eq!(out_q.pending_count().await, 0);
    }
}
