//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::services::EngineError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Engine(EngineError),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Engine(err) => {
                let message = err.to_string();
                match err {
                    EngineError::NotFound(_) => {
                        (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
                    }
                    EngineError::InsufficientStock {
                        available,
                        requested,
                        ..
                    } => (
                        StatusCode::CONFLICT,
                        ApiError::new("INSUFFICIENT_STOCK", message).with_details(format!(
                            "available={}, requested={}",
                            available, requested
                        )),
                    ),
                    EngineError::AlreadyResolved { status, .. } => (
                        StatusCode::CONFLICT,
                        ApiError::new("ALREADY_RESOLVED", message)
                            .with_details(format!("status={}", status)),
                    ),
                    EngineError::EngineOwnedJob { .. } => (
                        StatusCode::CONFLICT,
                        ApiError::new("ENGINE_OWNED_JOB", message),
                    ),
                    EngineError::DataUnavailable { source, .. } => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ApiError::new("DATA_UNAVAILABLE", message)
                            .with_details(source.context().to_string()),
                    ),
                    EngineError::Repository(source) if source.is_retryable() => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ApiError::new("DATA_UNAVAILABLE", message),
                    ),
                    EngineError::Repository(_) | EngineError::Configuration(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiError::new("INTERNAL_ERROR", message),
                    ),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        if status.is_server_error() {
            log::error!("{} {}: {}", status.as_u16(), error.code, error.message);
        }
        (status, Json(error)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Engine(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Engine(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecommendationId, RecommendationStatus, ResourceId};

    fn status_of(err: AppError) -> (StatusCode, String) {
        let (status, body) = err.status_and_body();
        (status, body.code)
    }

    #[test]
    fn test_conflicts_map_to_409() {
        let stock = AppError::from(EngineError::InsufficientStock {
            resource_id: ResourceId(1),
            available: 2,
            requested: 5,
        });
        assert_eq!(
            status_of(stock),
            (StatusCode::CONFLICT, "INSUFFICIENT_STOCK".to_string())
        );

        let resolved = AppError::from(EngineError::AlreadyResolved {
            recommendation_id: RecommendationId(1),
            status: RecommendationStatus::Applied,
        });
        assert_eq!(
            status_of(resolved),
            (StatusCode::CONFLICT, "ALREADY_RESOLVED".to_string())
        );
    }

    #[test]
    fn test_engine_owned_job_report_is_409() {
        let err = AppError::from(EngineError::EngineOwnedJob {
            name: "priority-recalc".to_string(),
        });
        assert_eq!(
            status_of(err),
            (StatusCode::CONFLICT, "ENGINE_OWNED_JOB".to_string())
        );
    }

    #[test]
    fn test_repository_errors() {
        let missing = AppError::from(RepositoryError::not_found("Recommendation 9 not found"));
        assert_eq!(status_of(missing).0, StatusCode::NOT_FOUND);

        let down = AppError::from(RepositoryError::connection("pool exhausted"));
        assert_eq!(
            status_of(down),
            (StatusCode::SERVICE_UNAVAILABLE, "DATA_UNAVAILABLE".to_string())
        );

        let broken = AppError::from(RepositoryError::query("syntax error"));
        assert_eq!(status_of(broken).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
