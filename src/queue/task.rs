//! Task value object and priority.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque task identifier assigned by the queue broker on lease.
pub type TaskId = u64;

/// Queue priority, used for ordering within the broker and carried through
/// on recheck re-enqueues so a task keeps the priority it arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Lowest priority.
    Low,
    /// Default priority for tasks that do not specify one.
    Normal,
    /// Elevated priority.
    High,
    /// Highest priority.
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Metadata attached to a leased task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Priority the task was enqueued with.
    pub priority: Priority,
}

/// A task leased from the queue broker.
///
/// After `take` returns a `Task`, exactly one of `ack`/`bury`/`put` is
/// expected to be called against it before it is dropped; the broker
/// relies on lease-expiry to redeliver a task whose worker never reports
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Broker-assigned identifier, opaque to application code.
    pub id: TaskId,
    /// Task payload, a string-keyed JSON mapping.
    pub data: Map<String, Value>,
    /// Scheduling metadata.
    pub meta: TaskMeta,
}

impl Task {
    /// Look up a string field in `data`, if present and a JSON string.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Look up a boolean field in `data`, defaulting to `false` if absent.
    #[must_use]
    pub fn data_bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Verdict produced by a worker for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Declare the task successfully processed.
    Ack,
    /// Declare the task failed; the broker retains it for inspection.
    Bury,
}
