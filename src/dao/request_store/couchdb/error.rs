//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::{StorageError, StoreErrorKind};

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB could not be reached while creating or checking the database.
    #[error("failed to reach CouchDB database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Decoding a JSON value into the expected model failed.
    #[error("failed to deserialize CouchDB value for `{path}`")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The document kept changing under us.
    #[error("gave up on `{path}` after {attempts} revision conflict(s)")]
    RevisionConflict { path: String, attempts: u32 },
    /// Failed to parse a document ID into a UUID.
    #[error("invalid document ID `{doc_id}`: {kind}")]
    InvalidDocId { doc_id: String, kind: &'static str },
}

impl CouchDaoError {
    /// Map the failure onto the connectivity / access / unknown split.
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            CouchDaoError::DatabaseQuery { .. } | CouchDaoError::RequestSend { .. } => {
                StoreErrorKind::Connectivity
            }
            CouchDaoError::DatabaseStatus { status, .. }
            | CouchDaoError::RequestStatus { status, .. } => status_kind(*status),
            _ => StoreErrorKind::Unknown,
        }
    }
}

fn status_kind(status: StatusCode) -> StoreErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreErrorKind::PermissionDenied,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT | StatusCode::BAD_GATEWAY => {
            StoreErrorKind::Connectivity
        }
        _ => StoreErrorKind::Unknown,
    }
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        StorageError::classified(err.kind(), err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_errors_are_classified_as_permission_denied() {
        let err = CouchDaoError::RequestStatus {
            path: "request::x".into(),
            status: StatusCode::FORBIDDEN,
        };
        assert_eq!(err.kind(), StoreErrorKind::PermissionDenied);

        let err = CouchDaoError::DatabaseStatus {
            database: "karaoke".into(),
            status: StatusCode::UNAUTHORIZED,
        };
        assert_eq!(err.kind(), StoreErrorKind::PermissionDenied);
    }

    #[test]
    fn other_failures_are_unknown() {
        let err = CouchDaoError::RequestStatus {
            path: "_bulk_docs".into(),
            status: StatusCode::BAD_REQUEST,
        };
        assert_eq!(err.kind(), StoreErrorKind::Unknown);
        let err = CouchDaoError::RevisionConflict {
            path: "session::current".into(),
            attempts: 3,
        };
        assert_eq!(err.kind(), StoreErrorKind::Unknown);
    }
}
