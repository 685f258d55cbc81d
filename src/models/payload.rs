//! # Task Payloads
//!
//! Type-specific parameters carried by a task and its bus message. Each
//! [`TaskType`] owns exactly one payload struct; [`TaskPayload`] is the tagged
//! union over them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::task::TaskType;

/// Feature flag name to enabled state
pub type FeatureFlags = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProvisionPayload {
    pub tenant_id: Uuid,
    pub tenant_instance_id: Uuid,
    pub subdomain: String,
    pub region: String,
    pub plan: String,
    pub admin_email: String,
    #[serde(default)]
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDeprovisionPayload {
    pub tenant_instance_id: Uuid,
    #[serde(default)]
    pub retain_backups: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUpdatePayload {
    pub tenant_instance_id: Uuid,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceGenerationPayload {
    pub tenant_instance_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Tagged union of per-type payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "taskType", content = "payload")]
pub enum TaskPayload {
    TenantProvision(TenantProvisionPayload),
    TenantDeprovision(TenantDeprovisionPayload),
    FeatureUpdate(FeatureUpdatePayload),
    InvoiceGeneration(InvoiceGenerationPayload),
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::TenantProvision(_) => TaskType::TenantProvision,
            Self::TenantDeprovision(_) => TaskType::TenantDeprovision,
            Self::FeatureUpdate(_) => TaskType::FeatureUpdate,
            Self::InvoiceGeneration(_) => TaskType::InvoiceGeneration,
        }
    }

    pub fn tenant_instance_id(&self) -> Uuid {
        match self {
            Self::TenantProvision(p) => p.tenant_instance_id,
            Self::TenantDeprovision(p) => p.tenant_instance_id,
            Self::FeatureUpdate(p) => p.tenant_instance_id,
            Self::InvoiceGeneration(p) => p.tenant_instance_id,
        }
    }

    /// Serialize only the inner payload object (no discriminator)
    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::TenantProvision(p) => serde_json::to_value(p),
            Self::TenantDeprovision(p) => serde_json::to_value(p),
            Self::FeatureUpdate(p) => serde_json::to_value(p),
            Self::InvoiceGeneration(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild a payload from its discriminator and inner object
    pub fn from_body(
        task_type: TaskType,
        body: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match task_type {
            TaskType::TenantProvision => Self::TenantProvision(serde_json::from_value(body)?),
            TaskType::TenantDeprovision => Self::TenantDeprovision(serde_json::from_value(body)?),
            TaskType::FeatureUpdate => Self::FeatureUpdate(serde_json::from_value(body)?),
            TaskType::InvoiceGeneration => Self::InvoiceGeneration(serde_json::from_value(body)?),
        })
    }
}
