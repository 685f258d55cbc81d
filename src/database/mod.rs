//! # Task Store
//!
//! Durable record of each task. The store holds no business logic: it inserts,
//! fetches and conditionally updates rows keyed by `task_id`. Every update is a
//! compare-and-swap on the row `version`, which is the only synchronization
//! point between concurrent worker callbacks.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ProvisionTask, TaskId};

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Task already exists: {task_id}")]
    DuplicateTask { task_id: TaskId },

    #[error("Task not found: {task_id}")]
    NotFound { task_id: TaskId },

    #[error("Tenant instance not found: {tenant_instance_id}")]
    TenantInstanceNotFound { tenant_instance_id: Uuid },

    #[error("Concurrent modification of task {task_id}: expected version {expected}")]
    VersionConflict { task_id: TaskId, expected: i64 },

    #[error("Store unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },
}

impl StoreError {
    pub fn unavailable(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn corrupt_row(table: impl Into<String>, message: impl ToString) -> Self {
        Self::CorruptRow {
            table: table.into(),
            message: message.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug {
    /// Insert a new task; fails with `DuplicateTask` if the id is taken
    async fn insert(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask>;

    async fn get(&self, task_id: &TaskId) -> StoreResult<Option<ProvisionTask>>;

    /// Write `task` if the stored version still equals `task.version`.
    ///
    /// Returns the stored record with its version incremented, or
    /// `VersionConflict` if another writer got there first.
    async fn update(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask>;

    /// Processing tasks whose lease expired at or before `now`, oldest first
    async fn find_expired_leases(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ProvisionTask>>;
}
