//! # Orchestration Engine
//!
//! Task lifecycle management for tenant provisioning.
//!
//! ## Core Components
//!
//! - **TaskTracker**: Read-modify-write lifecycle of individual tasks over the task store
//! - **ProvisioningOrchestrator**: Enqueue, status, retry and worker callback façade
//! - **BackoffCalculator**: Exponential `notBefore` delay for re-published retries
//! - **LeaseReconciler**: Background loop that fails and requeues tasks with expired worker leases

pub mod backoff;
pub mod lease_reconciler;
pub mod provisioning_orchestrator;
pub mod task_tracker;
pub mod types;

pub use backoff::BackoffCalculator;
pub use lease_reconciler::LeaseReconciler;
pub use provisioning_orchestrator::ProvisioningOrchestrator;
pub use task_tracker::TaskTracker;
pub use types::{
    CancelOutcome, IgnoreReason, InvoiceRequest, ProvisionTenantRequest, ReconciliationReport,
    RetryOutcome, StatusUpdate, TaskCreationResponse, TaskStatusResponse, UpdateOutcome,
};
