//! # Worker Callback Handlers
//!
//! Internal endpoints workers call while processing a task. All of them sit
//! behind the service token middleware, which supplies the caller's claims.
//!
//! Late and duplicate callbacks are answered with 200 and `applied: false`
//! so that at-least-once redelivery never looks like a failure to the worker.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::ServiceClaims;
use crate::models::TaskId;
use crate::orchestration::{IgnoreReason, StatusUpdate, TaskStatusResponse, UpdateOutcome};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct StepRequest {
    pub step: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRequest {
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_reason: Option<IgnoreReason>,
    pub task: TaskStatusResponse,
}

impl From<UpdateOutcome> for CallbackResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            applied: outcome.is_applied(),
            ignored_reason: outcome.ignore_reason(),
            task: TaskStatusResponse::from(outcome.task()),
        }
    }
}

/// POST /internal/tasks/:task_id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Extension(claims): Extension<ServiceClaims>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<CallbackResponse>> {
    let outcome = state
        .orchestrator
        .update_task_status(&claims, &TaskId::from(task_id), update)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /internal/tasks/:task_id/steps
pub async fn add_step(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Extension(claims): Extension<ServiceClaims>,
    Json(request): Json<StepRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let outcome = state
        .orchestrator
        .add_completed_step(&claims, &TaskId::from(task_id), &request.step)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /internal/tasks/:task_id/complete
pub async fn complete(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Extension(claims): Extension<ServiceClaims>,
) -> ApiResult<Json<CallbackResponse>> {
    let outcome = state
        .orchestrator
        .mark_task_completed(&claims, &TaskId::from(task_id))
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /internal/tasks/:task_id/fail
pub async fn fail(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Extension(claims): Extension<ServiceClaims>,
    Json(request): Json<FailRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let outcome = state
        .orchestrator
        .mark_task_failed(&claims, &TaskId::from(task_id), &request.error_message)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /internal/tasks/:task_id/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Extension(claims): Extension<ServiceClaims>,
) -> ApiResult<Json<CallbackResponse>> {
    let outcome = state
        .orchestrator
        .renew_lease(&claims, &TaskId::from(task_id))
        .await?;
    Ok(Json(outcome.into()))
}
