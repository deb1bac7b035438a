use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::{StorageError, StoreErrorKind},
    state::lifecycle::LifecycleError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend rejected or failed the operation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Missing or wrong admin credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The caller is known but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// New requests are not admitted right now.
    #[error("the karaoke session is closed")]
    SessionClosed,
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Blank { .. } => ServiceError::InvalidInput(err.to_string()),
            LifecycleError::SessionClosed => ServiceError::SessionClosed,
            LifecycleError::NotOwner | LifecycleError::NotPending { .. } => {
                ServiceError::Forbidden(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Submission attempted while the gate is closed.
    #[error("the karaoke session is closed")]
    SessionClosed,
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The document store failed; the kind drives the banner shown to users.
    #[error("storage error: {message}")]
    Storage {
        kind: StoreErrorKind,
        message: String,
    },
    /// No storage backend is installed.
    #[error("service unavailable: degraded mode")]
    Degraded,
    /// Operation exceeded its timeout.
    #[error("operation timed out")]
    Timeout,
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::SessionClosed => "session_closed",
            AppError::Conflict(_) => "conflict",
            AppError::Storage { kind, .. } => match kind {
                StoreErrorKind::Connectivity => "connectivity",
                StoreErrorKind::PermissionDenied => "permission_denied",
                StoreErrorKind::Unknown => "store_unknown",
            },
            AppError::Degraded => "degraded",
            AppError::Timeout => "timeout",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionClosed | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage { kind, .. } => match kind {
                StoreErrorKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
                StoreErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                StoreErrorKind::Unknown => StatusCode::BAD_GATEWAY,
            },
            AppError::Degraded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::Storage {
                kind: source.kind(),
                message: source.to_string(),
            },
            ServiceError::Degraded => AppError::Degraded,
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::SessionClosed => AppError::SessionClosed,
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::Timeout,
        }
    }
}

/// JSON error payload returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::queue::RequestStatus;

    #[test]
    fn lifecycle_errors_map_to_distinct_service_errors() {
        assert!(matches!(
            ServiceError::from(LifecycleError::Blank { field: "name" }),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::SessionClosed),
            ServiceError::SessionClosed
        ));
        assert!(matches!(
            ServiceError::from(LifecycleError::NotPending {
                status: RequestStatus::Playing
            }),
            ServiceError::Forbidden(_)
        ));
    }

    #[test]
    fn storage_kinds_keep_their_classification() {
        let err = StorageError::classified(
            StoreErrorKind::PermissionDenied,
            "rules rejected the write".into(),
            std::io::Error::other("denied"),
        );
        let app: AppError = ServiceError::from(err).into();
        assert_eq!(app.code(), "permission_denied");
        assert_eq!(app.status(), StatusCode::FORBIDDEN);

        let app: AppError = ServiceError::Unavailable(StorageError::BatchIncomplete {
            failed: 1,
            total: 3,
        })
        .into();
        assert_eq!(app.code(), "store_unknown");
        assert_eq!(app.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn closed_session_is_a_conflict() {
        let app = AppError::from(ServiceError::SessionClosed);
        assert_eq!(app.code(), "session_closed");
        assert_eq!(app.status(), StatusCode::CONFLICT);
    }
}
