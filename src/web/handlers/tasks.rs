//! # Task Handlers
//!
//! Caller-facing status, history, retry and cancel endpoints.

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use crate::models::{TaskId, TaskTransition};
use crate::orchestration::TaskStatusResponse;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// GET /tasks/:task_id
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task_id = TaskId::from(task_id);
    Ok(Json(state.orchestrator.get_task_status(&task_id).await?))
}

/// GET /tasks/:task_id/history
pub async fn get_task_history(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Vec<TaskTransition>>> {
    let task_id = TaskId::from(task_id);
    Ok(Json(state.orchestrator.task_history(&task_id).await?))
}

/// POST /tasks/:task_id/retry; 409 when the task is not retry-eligible
pub async fn retry_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task_id = TaskId::from(task_id);
    info!(task_id = %task_id, "Retry requested via API");
    Ok(Json(state.orchestrator.retry_task(&task_id).await?))
}

/// POST /tasks/:task_id/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task_id = TaskId::from(task_id);
    info!(task_id = %task_id, "Cancellation requested via API");
    Ok(Json(state.orchestrator.cancel_task(&task_id).await?))
}
