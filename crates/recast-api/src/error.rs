//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, ApiError>`; domain errors map
//! to a consistent JSON body with a machine-readable code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use recast_core::error::PipelineError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RunNotFound(id) => Self::not_found(format!("Run not found: {}", id)),
            PipelineError::InvalidInput(msg) => Self::bad_request(msg),
            PipelineError::TerminalRun { run_id, status } => Self::new(
                StatusCode::CONFLICT,
                "RUN_TERMINAL",
                format!("Run {} is already {}", run_id, status),
            ),
            PipelineError::Fatal { step, message } => {
                Self::internal(format!("{} failed: {}", step, message))
            }
            PipelineError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                Self::internal("Failed to access store")
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Unhandled error in handler");
        Self::internal("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn run_not_found_maps_to_404() {
        let err: ApiError = PipelineError::RunNotFound(Uuid::new_v4()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn store_error_hides_details() {
        let err: ApiError = PipelineError::Store(anyhow::anyhow!("secret dsn")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("secret"));
    }
}
