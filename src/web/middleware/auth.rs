//! # Service Token Middleware
//!
//! Validates the bearer service token on worker callback routes and stores
//! the resulting [`ServiceClaims`](crate::auth::ServiceClaims) in the request
//! extensions. Handlers authorize the claims against the task they touch.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::web::errors::ApiError;
use crate::web::state::AppState;

pub async fn require_service_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = state
        .orchestrator
        .authenticate_header(request.headers().get(AUTHORIZATION))?;

    debug!(
        service_id = %claims.sub,
        service_type = %claims.service_type,
        path = %request.uri().path(),
        "Authenticated worker callback"
    );

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
