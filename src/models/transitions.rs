use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::TaskStatus;

/// Audit record of a single task status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTransition {
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    /// Event type that caused the change (`start`, `fail`, `retry`, ...)
    pub event: String,
    pub worker_id: Option<String>,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
