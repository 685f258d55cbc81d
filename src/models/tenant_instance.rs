//! # Tenant Instance Collaborator
//!
//! Tenant instances are owned by the control plane; the orchestrator only
//! reads their deployment status to validate requests and writes the final
//! status when a task completes or fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::database::{StoreError, StoreResult};

/// Deployment status of a tenant instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Pending,
    Provisioning,
    Active,
    Deprovisioning,
    Deprovisioned,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Deprovisioning => "deprovisioning",
            Self::Deprovisioned => "deprovisioned",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "deprovisioning" => Ok(Self::Deprovisioning),
            "deprovisioned" => Ok(Self::Deprovisioned),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid deployment status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInstance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subdomain: String,
    pub region: String,
    pub status: DeploymentStatus,
    pub updated_at: DateTime<Utc>,
}

impl TenantInstance {
    pub fn new(
        tenant_id: Uuid,
        subdomain: impl Into<String>,
        region: impl Into<String>,
        status: DeploymentStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            subdomain: subdomain.into(),
            region: region.into(),
            status,
            updated_at: Utc::now(),
        }
    }
}

/// Read current deployment status; write final state on task completion
#[async_trait]
pub trait TenantInstanceRepository: Send + Sync + fmt::Debug {
    async fn find(&self, id: Uuid) -> StoreResult<Option<TenantInstance>>;

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> StoreResult<()>;

    /// Move the instance to `next` only while it is still `expected`.
    ///
    /// Returns `false` when the status moved on (or the row is gone), so
    /// exactly one of several concurrent claimants wins.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: DeploymentStatus,
        next: DeploymentStatus,
    ) -> StoreResult<bool>;
}

/// Map-backed repository for tests and local development
#[derive(Debug, Default)]
pub struct InMemoryTenantInstanceRepository {
    instances: DashMap<Uuid, TenantInstance>,
}

impl InMemoryTenantInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: TenantInstance) {
        self.instances.insert(instance.id, instance);
    }
}

#[async_trait]
impl TenantInstanceRepository for InMemoryTenantInstanceRepository {
    async fn find(&self, id: Uuid) -> StoreResult<Option<TenantInstance>> {
        Ok(self.instances.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> StoreResult<()> {
        let mut entry = self
            .instances
            .get_mut(&id)
            .ok_or(StoreError::TenantInstanceNotFound {
                tenant_instance_id: id,
            })?;
        debug!(
            tenant_instance_id = %id,
            from = %entry.status,
            to = %status,
            "Updating tenant instance status"
        );
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: DeploymentStatus,
        next: DeploymentStatus,
    ) -> StoreResult<bool> {
        // The shard write lock makes check and set one step
        let Some(mut entry) = self.instances.get_mut(&id) else {
            return Ok(false);
        };
        if entry.status != expected {
            debug!(
                tenant_instance_id = %id,
                expected = %expected,
                actual = %entry.status,
                "Tenant instance status changed before claim"
            );
            return Ok(false);
        }
        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Debug, FromRow)]
struct TenantInstanceRow {
    id: Uuid,
    tenant_id: Uuid,
    subdomain: String,
    region: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantInstanceRow> for TenantInstance {
    type Error = StoreError;

    fn try_from(row: TenantInstanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            subdomain: row.subdomain,
            region: row.region,
            status: row
                .status
                .parse()
                .map_err(|e: String| StoreError::corrupt_row("tenant_instances", e))?,
            updated_at: row.updated_at,
        })
    }
}

/// Repository over the control plane's `tenant_instances` table
#[derive(Debug, Clone)]
pub struct PgTenantInstanceRepository {
    pool: PgPool,
}

impl PgTenantInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantInstanceRepository for PgTenantInstanceRepository {
    async fn find(&self, id: Uuid) -> StoreResult<Option<TenantInstance>> {
        let row = sqlx::query_as::<_, TenantInstanceRow>(
            r#"
            SELECT id, tenant_id, subdomain, region, status, updated_at
            FROM tenant_instances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("find_tenant_instance", e))?;

        row.map(TenantInstance::try_from).transpose()
    }

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_instances
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("update_tenant_instance_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TenantInstanceNotFound {
                tenant_instance_id: id,
            });
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: DeploymentStatus,
        next: DeploymentStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_instances
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("transition_tenant_instance_status", e))?;

        Ok(result.rows_affected() == 1)
    }
}
