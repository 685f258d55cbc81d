//! # Web API Module
//!
//! Axum REST surface of the orchestrator.
//!
//! - [`routes`] - Route groups: health, tasks, tenant instances, worker callbacks
//! - [`handlers`] - Request handlers per route group
//! - [`middleware`] - Service token authentication and the shared layer stack
//! - [`errors`] - `ProvisioningError` to HTTP status mapping
//! - [`state`] - Shared application state

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Build the application router with all routes and middleware
pub fn create_app(app_state: AppState) -> Router {
    let callback_routes = routes::callback_routes().route_layer(
        axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::auth::require_service_token,
        ),
    );

    let router = Router::new()
        .merge(routes::health_routes())
        .merge(routes::task_routes())
        .merge(routes::tenant_instance_routes())
        .merge(callback_routes);

    middleware::apply_middleware_stack(router, &app_state.config).with_state(app_state)
}
