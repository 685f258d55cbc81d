//! # Web API Errors
//!
//! HTTP mapping of [`ProvisioningError`]. Every error body has the shape
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::{ErrorKind, ProvisioningError};

/// Seconds a client should wait before retrying a 503
const RETRY_AFTER_SECONDS: u64 = 5;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationError { reason: String },

    #[error("Authorization failed: {reason}")]
    AuthorizationError { reason: String },

    #[error("Service temporarily unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error")]
    Internal { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn auth_error(reason: impl Into<String>) -> Self {
        Self::AuthenticationError {
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::AuthenticationError { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthorizationError { .. } => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Conflict { .. } => "CONFLICT",
            Self::AuthenticationError { .. } => "UNAUTHORIZED",
            Self::AuthorizationError { .. } => "FORBIDDEN",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        let message = err.to_string();
        match err {
            ProvisioningError::TaskNotFound(_) | ProvisioningError::TenantInstanceNotFound(_) => {
                Self::NotFound { message }
            }
            ProvisioningError::Forbidden(_) => Self::AuthorizationError { reason: message },
            other => match other.kind() {
                ErrorKind::Validation => Self::BadRequest { message },
                ErrorKind::Conflict => Self::Conflict { message },
                ErrorKind::TransientInfrastructure => Self::ServiceUnavailable { message },
                ErrorKind::Authentication => Self::AuthenticationError { reason: message },
                ErrorKind::Configuration => Self::Internal { message },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Configuration details stay in the logs
            Self::Internal { message } => {
                tracing::error!(error = %message, "Internal error while handling request");
                "Internal server error".to_string()
            }
            Self::NotFound { message }
            | Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::ServiceUnavailable { message } => message.clone(),
            Self::AuthenticationError { reason } | Self::AuthorizationError { reason } => {
                reason.clone()
            }
        };
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": message,
            }
        }));

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (
                status,
                [(header::RETRY_AFTER, RETRY_AFTER_SECONDS.to_string())],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}
