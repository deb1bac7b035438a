use std::error::Error;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification of a store failure; each calls for a different remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// Network or server unreachable: retrying may help.
    Connectivity,
    /// The store's access rules rejected the operation.
    PermissionDenied,
    /// Anything else.
    Unknown,
}

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        kind: StoreErrorKind,
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("batch delete incomplete: {failed} of {total} document(s) were not removed")]
    BatchIncomplete { failed: usize, total: usize },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        Self::classified(StoreErrorKind::Connectivity, message, source)
    }

    /// Construct an error with an explicit classification.
    pub fn classified(
        kind: StoreErrorKind,
        message: String,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            kind,
            message,
            source: Box::new(source),
        }
    }

    /// Classification used to pick the banner shown to users.
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StorageError::Unavailable { kind, .. } => *kind,
            StorageError::BatchIncomplete { .. } => StoreErrorKind::Unknown,
        }
    }
}
