//! # Provision Task Model
//!
//! The unit of asynchronous provisioning work. A `ProvisionTask` is created at
//! enqueue time (Queued, progress 0), mutated only through the task tracker in
//! response to worker callbacks, and never deleted: terminal tasks stay around
//! for audit and retry history.
//!
//! ## Database Schema
//!
//! Maps to the `provision_tasks` table (see `migrations/`):
//! - `task_id`: opaque caller-visible identifier (TEXT, primary key)
//! - `status`: snake_case [`TaskStatus`]
//! - `steps_completed`: TEXT[] append-only step log
//! - `payload` / `history`: JSONB
//! - `version`: optimistic concurrency token bumped on every write

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::payload::TaskPayload;
use super::transitions::TaskTransition;
use crate::constants::{CORRELATION_ID_PREFIX, DEFAULT_MAX_RETRIES, TASK_ID_PREFIX};
use crate::state_machine::TaskStatus;

/// Opaque task identifier, stable across retries of the same task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(format!("{TASK_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Tracing identifier; a fresh one is minted for every publish of a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(format!("{CORRELATION_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of provisioning work; immutable after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    TenantProvision,
    TenantDeprovision,
    FeatureUpdate,
    InvoiceGeneration,
}

impl TaskType {
    pub fn all() -> &'static [TaskType] {
        &[
            Self::TenantProvision,
            Self::TenantDeprovision,
            Self::FeatureUpdate,
            Self::InvoiceGeneration,
        ]
    }

    /// Bus subject workers subscribe to, `provisioning.<resource>.<action>`
    pub fn subject(&self) -> &'static str {
        match self {
            Self::TenantProvision => "provisioning.tenant.provision",
            Self::TenantDeprovision => "provisioning.tenant.deprovision",
            Self::FeatureUpdate => "provisioning.feature.update",
            Self::InvoiceGeneration => "provisioning.invoice.generate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantProvision => "TenantProvision",
            Self::TenantDeprovision => "TenantDeprovision",
            Self::FeatureUpdate => "FeatureUpdate",
            Self::InvoiceGeneration => "InvoiceGeneration",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TenantProvision" => Ok(Self::TenantProvision),
            "TenantDeprovision" => Ok(Self::TenantDeprovision),
            "FeatureUpdate" => Ok(Self::FeatureUpdate),
            "InvoiceGeneration" => Ok(Self::InvoiceGeneration),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

/// Durable record of a provisioning task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionTask {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub steps_completed: Vec<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub tenant_instance_id: Uuid,
    pub initiated_by: String,
    pub worker_id: Option<String>,
    pub correlation_id: CorrelationId,
    pub payload: TaskPayload,
    pub cancellation_requested: bool,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub history: Vec<TaskTransition>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisionTask {
    /// Whether the retry path is open: failed with budget left
    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Processing
            && self.lease_expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Append `step` unless it is already the last entry
    pub fn record_step(&mut self, step: &str) -> bool {
        if self.steps_completed.last().map(String::as_str) == Some(step) {
            return false;
        }
        self.steps_completed.push(step.to_string());
        true
    }

    /// Wall-clock time from creation to the last update
    pub fn elapsed(&self) -> Duration {
        self.updated_at.signed_duration_since(self.created_at)
    }
}

/// New task for creation (without tracker-managed fields)
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_id: TaskId,
    pub tenant_instance_id: Uuid,
    pub payload: TaskPayload,
    pub initiated_by: String,
    pub correlation_id: CorrelationId,
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(task_id: TaskId, tenant_instance_id: Uuid, payload: TaskPayload) -> Self {
        Self {
            task_id,
            tenant_instance_id,
            payload,
            initiated_by: "system".to_string(),
            correlation_id: CorrelationId::generate(),
            max_retries: None,
        }
    }

    pub fn with_initiated_by(mut self, initiated_by: impl Into<String>) -> Self {
        self.initiated_by = initiated_by.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Materialize the initial Queued record
    pub fn into_task(self, default_max_retries: u32, now: DateTime<Utc>) -> ProvisionTask {
        let task_type = self.payload.task_type();
        ProvisionTask {
            task_id: self.task_id,
            task_type,
            status: TaskStatus::Queued,
            progress: 0,
            current_step: None,
            steps_completed: Vec::new(),
            error_message: None,
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
            tenant_instance_id: self.tenant_instance_id,
            initiated_by: self.initiated_by,
            worker_id: None,
            correlation_id: self.correlation_id,
            payload: self.payload,
            cancellation_requested: false,
            lease_expires_at: None,
            history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for NewTask {
    fn default() -> Self {
        let tenant_instance_id = Uuid::new_v4();
        Self {
            task_id: TaskId::generate(),
            tenant_instance_id,
            payload: TaskPayload::TenantDeprovision(super::payload::TenantDeprovisionPayload {
                tenant_instance_id,
                retain_backups: true,
            }),
            initiated_by: "system".to_string(),
            correlation_id: CorrelationId::generate(),
            max_retries: Some(DEFAULT_MAX_RETRIES),
        }
    }
}
