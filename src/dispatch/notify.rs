//! Notification worker: one HTTP POST per task, routed to the completion channel.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatch::completion::CompletionSender;
use crate::queue::{Task, Verdict};

/// Build a `reqwest::Client` honoring the configured connect timeout and
/// TLS verification policy. One client is shared across all notification
/// workers in a dispatch loop (connection pooling, same as any other
/// reqwest-based service).
///
/// # Errors
///
/// Returns an error if the underlying TLS backend fails to initialize.
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    verify_tls: bool,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()
}

/// Deliver one task as an HTTP POST to `task.data["callback_url"]`, then
/// post the verdict into `completion_tx`.
///
/// Any HTTP response that actually completes — 2xx or otherwise — is
/// treated as a successful delivery attempt (`Verdict::Ack`); only a
/// transport-level failure (connection refused, DNS failure, timeout, TLS
/// error, malformed response) buries the task. This worker never touches
/// the queue directly: the caller owns the queue adapter, and verdicts
/// only ever flow through the completion channel.
pub async fn notification_worker(task: Task, completion_tx: CompletionSender, client: reqwest::Client) {
    // Correlates this delivery attempt across the worker's own log lines and
    // whatever the receiving endpoint logs on its side, since `task.id` is
    // only meaningful to this broker.
    let trace_id = uuid::Uuid::new_v4();

    let Some(callback_url) = task.data_str("callback_url").map(str::to_owned) else {
        warn!(task_id = task.id, %trace_id, "task has no callback_url, burying");
        let _ = completion_tx.send((task, Verdict::Bury)).await;
        return;
    };

    let mut body = Value::Object(task.data.clone());
    if let Value::Object(map) = &mut body {
        map.insert("id".to_string(), Value::from(task.id));
    }

    let verdict = match client
        .post(&callback_url)
        .header("X-Trace-Id", trace_id.to_string())
        .json(&body)
        .send()
        .await
    {
        Ok(response) => {
            debug!(task_id = task.id, %trace_id, status = %response.status(), "delivered notification");
            Verdict::Ack
        }
        Err(err) => {
            warn!(task_id = task.id, %trace_id, error = %err, "notification delivery failed");
            Verdict::Bury
        }
    };

    if completion_tx.send((task, verdict)).await.is_err() {
        warn!("completion channel closed before verdict could be delivered");
    }
}
