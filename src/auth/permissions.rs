//! # Permission Vocabulary
//!
//! Permissions follow the `resource:action` pattern with wildcard support.
//! Each [`ServiceType`] may only be granted a fixed subset of them, and may
//! only act on the task types it handles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::permissions;
use crate::models::TaskType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServicePermission {
    /// Report status, steps, completion, failure and heartbeats for a task
    TasksUpdate,
    TasksRead,
    BillingInvoicesIssue,
}

impl ServicePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TasksUpdate => permissions::TASKS_UPDATE,
            Self::TasksRead => permissions::TASKS_READ,
            Self::BillingInvoicesIssue => permissions::BILLING_INVOICES_ISSUE,
        }
    }

    /// Resource component of the permission (before the colon).
    pub fn resource(&self) -> &'static str {
        match self {
            Self::TasksUpdate | Self::TasksRead => "tasks",
            Self::BillingInvoicesIssue => "billing",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == s)
    }

    pub fn all() -> &'static [ServicePermission] {
        &[
            Self::TasksUpdate,
            Self::TasksRead,
            Self::BillingInvoicesIssue,
        ]
    }
}

impl fmt::Display for ServicePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a single claimed permission string matches a required permission.
///
/// Supports `*`, `resource:*` and exact matches.
pub fn permission_matches(claimed: &str, required: &ServicePermission) -> bool {
    if claimed == "*" || claimed == required.as_str() {
        return true;
    }

    if let Some(prefix) = claimed.strip_suffix(":*") {
        return required.resource() == prefix;
    }

    false
}

pub fn has_permission(claimed: &[String], required: &ServicePermission) -> bool {
    claimed.iter().any(|c| permission_matches(c, required))
}

/// Kind of out-of-process service a token is issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    ProvisioningWorker,
    BillingWorker,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisioningWorker => "provisioning_worker",
            Self::BillingWorker => "billing_worker",
        }
    }

    /// Upper bound on what a token for this service type may carry
    pub fn grantable_permissions(&self) -> &'static [ServicePermission] {
        match self {
            Self::ProvisioningWorker => {
                &[ServicePermission::TasksUpdate, ServicePermission::TasksRead]
            }
            Self::BillingWorker => &[
                ServicePermission::TasksUpdate,
                ServicePermission::TasksRead,
                ServicePermission::BillingInvoicesIssue,
            ],
        }
    }

    pub fn can_be_granted(&self, permission: ServicePermission) -> bool {
        self.grantable_permissions().contains(&permission)
    }

    /// Task types whose callbacks this service may report
    pub fn handles(&self, task_type: TaskType) -> bool {
        match self {
            Self::ProvisioningWorker => matches!(
                task_type,
                TaskType::TenantProvision | TaskType::TenantDeprovision | TaskType::FeatureUpdate
            ),
            Self::BillingWorker => task_type == TaskType::InvoiceGeneration,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning_worker" => Ok(Self::ProvisioningWorker),
            "billing_worker" => Ok(Self::BillingWorker),
            _ => Err(format!("Invalid service type: {s}")),
        }
    }
}
