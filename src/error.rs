//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::event_store::EventStoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} already exists: {id}")]
    AlreadyExists { resource: &'static str, id: String },

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Persistence errors, passed through unchanged
    #[error(transparent)]
    Store(#[from] EventStoreError),
}

impl AppError {
    pub fn not_found(resource: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn already_exists(resource: &'static str, id: Uuid) -> Self {
        Self::AlreadyExists {
            resource,
            id: id.to_string(),
        }
    }

    /// Check if this error is an optimistic concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, AppError::Store(e) if e.is_concurrency_conflict())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request".to_string(), Some(msg.clone()))
            }

            // 404 Not Found
            AppError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                format!("{}_not_found", resource),
                Some(id.clone()),
            ),

            // 409 Conflict
            AppError::AlreadyExists { resource, id } => (
                StatusCode::CONFLICT,
                format!("{}_already_exists", resource),
                Some(id.clone()),
            ),

            // Domain errors: malformed input is 400, rule violations are 422
            AppError::Domain(domain_err) => {
                let status = if domain_err.is_validation_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (status, domain_err.error_code().to_string(), None)
            }

            AppError::Store(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => (
                StatusCode::CONFLICT,
                "version_conflict".to_string(),
                Some(format!("expected {}, found {}", expected, actual)),
            ),

            // 500 Internal Server Error
            AppError::Store(e) => {
                tracing::error!("Event store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error".to_string(), None)
            }
        };

        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status_and_code() {
        let id = Uuid::new_v4();
        let response = AppError::not_found("project", id).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = AppError::Store(EventStoreError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        });
        assert!(err.is_concurrency_conflict());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_domain_errors_map_to_4xx() {
        let validation = AppError::from(DomainError::validation("blank"));
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);

        let rule = AppError::from(DomainError::EmptyOrder(Uuid::new_v4()));
        assert_eq!(rule.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_storage_errors_map_to_500() {
        let err = AppError::Store(EventStoreError::UnsupportedEventType("x.y".to_string()));
        assert!(!err.is_concurrency_conflict());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let database = AppError::from(EventStoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(database.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let dispatch = AppError::from(EventStoreError::Dispatch("user_cleanup: down".to_string()));
        assert!(!dispatch.is_concurrency_conflict());
        assert_eq!(dispatch.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
