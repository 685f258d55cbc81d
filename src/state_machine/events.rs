use serde::{Deserialize, Serialize};

use super::states::TaskStatus;

/// Events that can trigger task state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Worker picked the task up
    Start,
    /// Worker reported progress on a task it is already processing
    Progress,
    /// Worker finished all steps
    Complete,
    /// Worker reported a business failure
    Fail(String),
    /// Task cancelled (outright while queued, acknowledged by the worker while processing)
    Cancel,
    /// Failed task put back on the queue
    Retry,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Event a worker status report maps onto, given the task's current status
    pub fn from_reported_status(
        current: TaskStatus,
        reported: TaskStatus,
        error_message: Option<&str>,
    ) -> Option<Self> {
        match reported {
            TaskStatus::Queued => None,
            TaskStatus::Processing if current == TaskStatus::Processing => Some(Self::Progress),
            TaskStatus::Processing => Some(Self::Start),
            TaskStatus::Completed => Some(Self::Complete),
            TaskStatus::Failed => Some(Self::Fail(
                error_message
                    .map(str::to_string)
                    .unwrap_or_else(|| "worker reported failure without details".to_string()),
            )),
            TaskStatus::Cancelled => Some(Self::Cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_shape() {
        let json = serde_json::to_value(TaskEvent::Fail("db unreachable".to_string())).unwrap();
        assert_eq!(json["type"], "fail");
        assert_eq!(json["data"], "db unreachable");
    }

    #[test]
    fn test_from_reported_status() {
        assert_eq!(
            TaskEvent::from_reported_status(TaskStatus::Queued, TaskStatus::Processing, None),
            Some(TaskEvent::Start)
        );
        assert_eq!(
            TaskEvent::from_reported_status(TaskStatus::Processing, TaskStatus::Processing, None),
            Some(TaskEvent::Progress)
        );
        assert_eq!(
            TaskEvent::from_reported_status(TaskStatus::Processing, TaskStatus::Queued, None),
            None
        );
        let fail = TaskEvent::from_reported_status(
            TaskStatus::Processing,
            TaskStatus::Failed,
            Some("schema missing"),
        )
        .unwrap();
        assert_eq!(fail.error_message(), Some("schema missing"));
    }
}
