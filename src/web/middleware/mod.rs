//! # Web API Middleware
//!
//! Service token authentication for worker callbacks plus the shared
//! tracing, timeout and CORS stack.

pub mod auth;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::web::state::AppState;

/// Apply tracing, request timeout and (when enabled) permissive CORS
pub fn apply_middleware_stack(router: Router<AppState>, config: &WebConfig) -> Router<AppState> {
    let router = router
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}
