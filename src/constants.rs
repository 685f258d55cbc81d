//! # System Constants
//!
//! Identifiers, defaults and event names that define the operational
//! boundaries of the provisioning orchestrator.

/// Prefix of generated task identifiers
pub const TASK_ID_PREFIX: &str = "tp_";

/// Prefix of generated correlation identifiers
pub const CORRELATION_ID_PREFIX: &str = "c_";

/// Retry budget applied when a task does not carry its own
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for any configured retry budget
pub const MAX_RETRY_BUDGET: u32 = 100;

/// Longest lifetime a service token may be issued with (30 days)
pub const MAX_TOKEN_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Progress value forced on completion
pub const PROGRESS_COMPLETE: u8 = 100;

/// Error message recorded when a worker lease runs out
pub const LEASE_EXPIRED_MESSAGE: &str = "worker lease expired before the task finished";

/// Task lifecycle event names used in structured logs
pub mod events {
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_STATUS_UPDATED: &str = "task.status_updated";
    pub const TASK_STEP_COMPLETED: &str = "task.step_completed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_RETRY_REQUESTED: &str = "task.retry_requested";
    pub const TASK_RETRY_ROLLED_BACK: &str = "task.retry_rolled_back";
    pub const TASK_CANCELLED: &str = "task.cancelled";
    pub const TASK_CANCELLATION_REQUESTED: &str = "task.cancellation_requested";
    pub const TASK_LEASE_RENEWED: &str = "task.lease_renewed";
    pub const TASK_LEASE_EXPIRED: &str = "task.lease_expired";
    pub const TASK_UPDATE_IGNORED: &str = "task.update_ignored";
}

/// Permission strings in `resource:action` form
pub mod permissions {
    pub const TASKS_UPDATE: &str = "tasks:update";
    pub const TASKS_READ: &str = "tasks:read";
    pub const BILLING_INVOICES_ISSUE: &str = "billing:invoices_issue";
}
