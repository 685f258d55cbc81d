pub mod payload;
pub mod task;
pub mod tenant_instance;
pub mod transitions;

// Re-export core models for easy access
pub use payload::{
    FeatureFlags, FeatureUpdatePayload, InvoiceGenerationPayload, TaskPayload,
    TenantDeprovisionPayload, TenantProvisionPayload,
};
pub use task::{CorrelationId, NewTask, ProvisionTask, TaskId, TaskType};
pub use tenant_instance::{
    DeploymentStatus, InMemoryTenantInstanceRepository, PgTenantInstanceRepository,
    TenantInstance, TenantInstanceRepository,
};
pub use transitions::TaskTransition;
