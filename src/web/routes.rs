//! # Web API Route Definitions

use axum::routing::{get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::basic_health))
}

/// Caller-facing task status and management
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/:task_id", get(handlers::tasks::get_task))
        .route("/tasks/:task_id/history", get(handlers::tasks::get_task_history))
        .route("/tasks/:task_id/retry", post(handlers::tasks::retry_task))
        .route("/tasks/:task_id/cancel", post(handlers::tasks::cancel_task))
}

/// Enqueue endpoints keyed by tenant instance
pub fn tenant_instance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tenant-instances/:id/provision",
            post(handlers::tenant_instances::provision),
        )
        .route(
            "/tenant-instances/:id/deprovision",
            post(handlers::tenant_instances::deprovision),
        )
        .route(
            "/tenant-instances/:id/features",
            put(handlers::tenant_instances::update_features),
        )
        .route(
            "/tenant-instances/:id/invoices",
            post(handlers::tenant_instances::generate_invoice),
        )
}

/// Worker callbacks; the caller wraps these in the service token middleware
pub fn callback_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/internal/tasks/:task_id/status",
            post(handlers::callbacks::update_status),
        )
        .route(
            "/internal/tasks/:task_id/steps",
            post(handlers::callbacks::add_step),
        )
        .route(
            "/internal/tasks/:task_id/complete",
            post(handlers::callbacks::complete),
        )
        .route(
            "/internal/tasks/:task_id/fail",
            post(handlers::callbacks::fail),
        )
        .route(
            "/internal/tasks/:task_id/heartbeat",
            post(handlers::callbacks::heartbeat),
        )
}
