//! # Error Types
//!
//! Error taxonomy for the provisioning orchestrator. Layer-specific errors
//! (store, messaging, auth, configuration) convert into [`ProvisioningError`],
//! which callers classify through [`ErrorKind`].

use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::config::ConfigurationError;
use crate::database::StoreError;
use crate::messaging::MessagingError;
use crate::models::TaskId;

/// Coarse classification used by callers and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request shape or invalid transition target. Not retried.
    Validation,
    /// Task already exists or target resource in an incompatible state. Not retried.
    Conflict,
    /// Bus unreachable or store unavailable. The caller may retry.
    TransientInfrastructure,
    /// Invalid, expired or under-privileged service token.
    Authentication,
    /// Misconfiguration detected at runtime.
    Configuration,
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: String,
        to: String,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Tenant instance not found: {0}")]
    TenantInstanceNotFound(Uuid),

    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Task {task_id} is not eligible for retry: {reason}")]
    RetryNotEligible { task_id: TaskId, reason: String },

    #[error("Transient infrastructure error: {0}")]
    TransientInfrastructure(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProvisioningError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientInfrastructure(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidTransition { .. }
            | Self::TaskNotFound(_)
            | Self::TenantInstanceNotFound(_) => ErrorKind::Validation,
            Self::DuplicateTask(_) | Self::Conflict(_) | Self::RetryNotEligible { .. } => {
                ErrorKind::Conflict
            }
            Self::TransientInfrastructure(_) => ErrorKind::TransientInfrastructure,
            Self::Authentication(_) | Self::Forbidden(_) => ErrorKind::Authentication,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the caller may reasonably retry the same request.
    ///
    /// Authentication failures on worker callbacks count as transient: the
    /// worker refreshes its token and resends.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientInfrastructure | ErrorKind::Authentication
        )
    }
}

impl From<StoreError> for ProvisioningError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateTask { task_id } => Self::DuplicateTask(task_id),
            StoreError::NotFound { task_id } => Self::TaskNotFound(task_id),
            StoreError::TenantInstanceNotFound { tenant_instance_id } => {
                Self::TenantInstanceNotFound(tenant_instance_id)
            }
            other => Self::TransientInfrastructure(other.to_string()),
        }
    }
}

impl From<MessagingError> for ProvisioningError {
    fn from(err: MessagingError) -> Self {
        Self::TransientInfrastructure(err.to_string())
    }
}

impl From<AuthError> for ProvisioningError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ConfigurationError(msg) => Self::Configuration(msg),
            other @ (AuthError::InsufficientPermissions(_)
            | AuthError::PermissionNotGrantable { .. }) => Self::Forbidden(other.to_string()),
            other => Self::Authentication(other.to_string()),
        }
    }
}

impl From<ConfigurationError> for ProvisioningError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type ProvisioningResult<T> = std::result::Result<T, ProvisioningError>;
