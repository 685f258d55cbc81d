//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::web::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub message_bus: &'static str,
    pub auth_enabled: bool,
    pub version: &'static str,
}

/// Liveness check: GET /health
pub async fn basic_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
        message_bus: state.orchestrator.bus_backend(),
        auth_enabled: state.orchestrator.token_issuer().is_enabled(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
