//! TCP-backed queue adapter.
//!
//! The wire protocol of the real broker a production deployment talks to
//! is treated as an external collaborator: this adapter speaks a minimal
//! JSON-line request/response protocol over a plain TCP socket instead of
//! reimplementing a specific broker's wire format. Swap this module out
//! for a real broker client without touching the dispatch core, which
//! only depends on [`crate::queue::QueueAdapter`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::QueueError;
use crate::queue::{Priority, QueueAdapter, Task, TaskId, TaskMeta};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Take { space: u32, tube: &'a str, timeout_ms: u64 },
    Ack { space: u32, tube: &'a str, id: TaskId },
    Bury { space: u32, tube: &'a str, id: TaskId },
    Put {
        space: u32,
        tube: &'a str,
        data: Map<String, Value>,
        delay_ms: u64,
        pri: Priority,
    },
}

#[derive(Debug, Deserialize)]
struct WireTask {
    id: TaskId,
    data: Map<String, Value>,
    #[serde(default)]
    pri: Priority,
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    task: Option<WireTask>,
    #[serde(default)]
    error: Option<String>,
}

/// Queue adapter bound to a single tube on a TCP-reachable broker.
pub struct TcpQueueAdapter {
    host: String,
    port: u16,
    space: u32,
    tube: String,
}

impl TcpQueueAdapter {
    /// Create an adapter against `host:port`, scoped to `space`/`tube`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, space: u32, tube: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            space,
            tube: tube.into(),
        }
    }

    async fn roundtrip(&self, req: &Request<'_>) -> Result<Response, QueueError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let mut line = serde_json::to_string(req).map_err(|e| QueueError::Decode(e.to_string()))?;
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        stream.flush().await.map_err(|e| QueueError::Transport(e.to_string()))?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        if response_line.trim().is_empty() {
            return Err(QueueError::Transport("broker closed connection".into()));
        }

        serde_json::from_str(response_line.trim()).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

#[async_trait]
impl QueueAdapter for TcpQueueAdapter {
    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError> {
        let req = Request::Take {
            space: self.space,
            tube: &self.tube,
            #[allow(clippy::cast_possible_truncation)]
            timeout_ms: timeout.as_millis() as u64,
        };
        let resp = self.roundtrip(&req).await?;
        if !resp.ok {
            return Err(QueueError::Rejected(resp.error.unwrap_or_default()));
        }
        Ok(resp.task.map(|t| Task {
            id: t.id,
            data: t.data,
            meta: TaskMeta { priority: t.pri },
        }))
    }

    async fn ack(&self, task: &Task) -> Result<(), QueueError> {
        let req = Request::Ack {
            space: self.space,
            tube: &self.tube,
            id: task.id,
        };
        let resp = self.roundtrip(&req).await?;
        if !resp.ok {
            return Err(QueueError::Rejected(resp.error.unwrap_or_default()));
        }
        Ok(())
    }

    async fn bury(&self, task: &Task) -> Result<(), QueueError> {
        let req = Request::Bury {
            space: self.space,
            tube: &self.tube,
            id: task.id,
        };
        let resp = self.roundtrip(&req).await?;
        if !resp.ok {
            return Err(QueueError::Rejected(resp.error.unwrap_or_default()));
        }
        Ok(())
    }

    async fn put(
        &self,
        data: Map<String, Value>,
        delay: Option<Duration>,
        pri: Priority,
    ) -> Result<(), QueueError> {
        let req = Request::Put {
            space: self.space,
            tube: &self.tube,
            data,
            #[allow(clippy::cast_possible_truncation)]
            delay_ms: delay.unwrap_or_default().as_millis() as u64,
            pri,
        };
        let resp = self.roundtrip(&req).await?;
        if !resp.ok {
            return Err(QueueError::Rejected(resp.error.unwrap_or_default()));
        }
        Ok(())
    }
}
