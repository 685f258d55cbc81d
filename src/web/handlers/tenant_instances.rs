//! # Tenant Instance Handlers
//!
//! Enqueue endpoints. Each returns 202 with the new task id as soon as the
//! task is persisted and published.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::FeatureFlags;
use crate::orchestration::{InvoiceRequest, ProvisionTenantRequest, TaskCreationResponse};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

type Accepted = (StatusCode, Json<TaskCreationResponse>);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionBody {
    pub plan: String,
    pub admin_email: String,
    #[serde(default)]
    pub features: FeatureFlags,
    pub initiated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprovisionBody {
    pub initiated_by: String,
    #[serde(default)]
    pub retain_backups: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesBody {
    pub features: FeatureFlags,
    pub initiated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBody {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub initiated_by: String,
}

/// POST /tenant-instances/:id/provision
pub async fn provision(
    State(state): State<AppState>,
    Path(tenant_instance_id): Path<Uuid>,
    Json(body): Json<ProvisionBody>,
) -> ApiResult<Accepted> {
    let response = state
        .orchestrator
        .provision_tenant(ProvisionTenantRequest {
            tenant_instance_id,
            plan: body.plan,
            admin_email: body.admin_email,
            features: body.features,
            initiated_by: body.initiated_by,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /tenant-instances/:id/deprovision
pub async fn deprovision(
    State(state): State<AppState>,
    Path(tenant_instance_id): Path<Uuid>,
    Json(body): Json<DeprovisionBody>,
) -> ApiResult<Accepted> {
    let response = state
        .orchestrator
        .deprovision_tenant(tenant_instance_id, &body.initiated_by, body.retain_backups)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// PUT /tenant-instances/:id/features
pub async fn update_features(
    State(state): State<AppState>,
    Path(tenant_instance_id): Path<Uuid>,
    Json(body): Json<FeaturesBody>,
) -> ApiResult<Accepted> {
    let response = state
        .orchestrator
        .update_tenant_features(tenant_instance_id, body.features, &body.initiated_by)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /tenant-instances/:id/invoices
pub async fn generate_invoice(
    State(state): State<AppState>,
    Path(tenant_instance_id): Path<Uuid>,
    Json(body): Json<InvoiceBody>,
) -> ApiResult<Accepted> {
    let response = state
        .orchestrator
        .generate_invoice(InvoiceRequest {
            tenant_instance_id,
            period_start: body.period_start,
            period_end: body.period_end,
            initiated_by: body.initiated_by,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
