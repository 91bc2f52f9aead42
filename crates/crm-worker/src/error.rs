//! CRM worker — error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use crm_core::error::DomainError;
use crm_dispatch::dispatcher::DispatchError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors of the worker process.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the schema migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// Rebuilding the read models from the event log failed.
    #[error("read model rebuild failed: {0}")]
    ReadModels(#[from] DomainError),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Repository(err) => Self(err),
            other => Self(DomainError::Infrastructure(other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::AggregateNotFound(_) => (StatusCode::NOT_FOUND, "aggregate_not_found"),
            DomainError::WrongExpectedVersion { .. } => {
                (StatusCode::CONFLICT, "wrong_expected_version")
            }
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::UnsupportedEventType(_) | DomainError::Serialization(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unreadable_event")
            }
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use crm_core::event::StreamId;
    use crm_dispatch::retry::RemoteError;

    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_aggregate_not_found_maps_to_404() {
        assert_eq!(
            status_of(DomainError::AggregateNotFound(StreamId::new(
                "acme", "user", "u-1"
            ))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_wrong_expected_version_maps_to_409() {
        assert_eq!(
            status_of(DomainError::WrongExpectedVersion {
                stream: StreamId::new("acme", "user", "u-1"),
                expected: 1,
                actual: 2,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("tenant must not be empty".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_dispatch_errors_map_through_their_cause() {
        assert_eq!(
            status_of(DispatchError::Repository(DomainError::Infrastructure(
                "db down".into()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(DispatchError::Forward(RemoteError::Terminal("rejected".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
