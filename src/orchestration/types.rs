//! # Orchestration Types
//!
//! Requests, responses and outcomes shared by the task tracker, the
//! provisioning orchestrator and the HTTP layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CorrelationId, FeatureFlags, ProvisionTask, TaskId, TaskType};
use crate::state_machine::TaskStatus;

/// Progress report from a worker.
///
/// `progress` is wider than the stored percentage so that out-of-range
/// values reach the tracker's validation instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub progress: u16,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn processing(progress: u8, current_step: Option<&str>) -> Self {
        Self {
            status: TaskStatus::Processing,
            progress: progress.into(),
            current_step: current_step.map(str::to_string),
            error_message: None,
        }
    }

    pub fn failed(progress: u8, error_message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            progress: progress.into(),
            current_step: None,
            error_message: Some(error_message.into()),
        }
    }

    pub fn completed() -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: crate::constants::PROGRESS_COMPLETE.into(),
            current_step: None,
            error_message: None,
        }
    }
}

/// Why a callback left the task untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Task already Completed, Failed or Cancelled
    TerminalState,
    /// Reported progress lower than the recorded progress
    RegressiveProgress,
    /// Same status, progress and step as already recorded
    Duplicate,
    /// Same progress, but names a step that is already completed
    StaleStep,
    /// Lease was renewed before reconciliation got to it
    LeaseNotExpired,
    /// Task moved on since the snapshot being restored was taken
    Superseded,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminalState => "terminal_state",
            Self::RegressiveProgress => "regressive_progress",
            Self::Duplicate => "duplicate",
            Self::StaleStep => "stale_step",
            Self::LeaseNotExpired => "lease_not_expired",
            Self::Superseded => "superseded",
        }
    }
}

/// Result of a tracker mutation. Out-of-order and duplicate callbacks are
/// not errors; they come back as `Ignored` with the unchanged task.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Applied(ProvisionTask),
    Ignored {
        task: ProvisionTask,
        reason: IgnoreReason,
    },
}

impl UpdateOutcome {
    pub fn task(&self) -> &ProvisionTask {
        match self {
            Self::Applied(task) | Self::Ignored { task, .. } => task,
        }
    }

    pub fn into_task(self) -> ProvisionTask {
        match self {
            Self::Applied(task) | Self::Ignored { task, .. } => task,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn ignore_reason(&self) -> Option<IgnoreReason> {
        match self {
            Self::Applied(_) => None,
            Self::Ignored { reason, .. } => Some(*reason),
        }
    }
}

/// A retry as persisted, with the Failed snapshot it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub previous: ProvisionTask,
    pub task: ProvisionTask,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// Queued task moved straight to Cancelled
    Cancelled(ProvisionTask),
    /// Processing task flagged; the worker acknowledges by reporting Cancelled
    CancellationRequested(ProvisionTask),
}

impl CancelOutcome {
    pub fn task(&self) -> &ProvisionTask {
        match self {
            Self::Cancelled(task) | Self::CancellationRequested(task) => task,
        }
    }
}

/// Caller-facing task snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub steps_completed: Vec<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub cancellation_requested: bool,
    pub tenant_instance_id: Uuid,
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProvisionTask> for TaskStatusResponse {
    fn from(task: &ProvisionTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            task_type: task.task_type,
            status: task.status,
            progress: task.progress,
            current_step: task.current_step.clone(),
            steps_completed: task.steps_completed.clone(),
            error_message: task.error_message.clone(),
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            cancellation_requested: task.cancellation_requested,
            tenant_instance_id: task.tenant_instance_id,
            correlation_id: task.correlation_id.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Returned immediately by every enqueue operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreationResponse {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub correlation_id: CorrelationId,
    pub status: TaskStatus,
}

impl From<&ProvisionTask> for TaskCreationResponse {
    fn from(task: &ProvisionTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            task_type: task.task_type,
            correlation_id: task.correlation_id.clone(),
            status: task.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionTenantRequest {
    pub tenant_instance_id: Uuid,
    pub plan: String,
    pub admin_email: String,
    #[serde(default)]
    pub features: FeatureFlags,
    pub initiated_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub tenant_instance_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub initiated_by: String,
}

/// Summary of one lease reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub examined: usize,
    pub failed: usize,
    pub requeued: usize,
    pub exhausted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.examined == 0
    }
}
