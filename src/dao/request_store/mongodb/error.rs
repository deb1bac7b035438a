use mongodb::error::{Error as MongoError, ErrorKind};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StoreErrorKind};

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Server error codes returned when the caller lacks the required role.
const UNAUTHORIZED_CODES: [i32; 2] = [13, 18];

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to create request `{id}`")]
    CreateRequest {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load request `{id}`")]
    LoadRequest {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update status of request `{id}`")]
    UpdateStatus {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete request `{id}`")]
    DeleteRequest {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list requests")]
    ListRequests {
        #[source]
        source: MongoError,
    },
    #[error("failed to read or write the session gate")]
    Session {
        #[source]
        source: MongoError,
    },
    #[error("session close transaction failed")]
    CloseSession {
        #[source]
        source: MongoError,
    },
    #[error("connection probe failed")]
    Probe {
        #[source]
        source: MongoError,
    },
    #[error("stored request has malformed id `{id}`")]
    MalformedId {
        id: String,
        #[source]
        source: uuid::Error,
    },
}

impl MongoDaoError {
    fn driver_error(&self) -> Option<&MongoError> {
        match self {
            MongoDaoError::InvalidUri { source, .. }
            | MongoDaoError::ClientConstruction { source }
            | MongoDaoError::InitialPing { source, .. }
            | MongoDaoError::HealthPing { source }
            | MongoDaoError::EnsureIndex { source, .. }
            | MongoDaoError::CreateRequest { source, .. }
            | MongoDaoError::LoadRequest { source, .. }
            | MongoDaoError::UpdateStatus { source, .. }
            | MongoDaoError::DeleteRequest { source, .. }
            | MongoDaoError::ListRequests { source }
            | MongoDaoError::Session { source }
            | MongoDaoError::CloseSession { source }
            | MongoDaoError::Probe { source } => Some(source),
            MongoDaoError::MissingEnvVar { .. } | MongoDaoError::MalformedId { .. } => None,
        }
    }

    /// Map the driver error onto the connectivity / access / unknown split.
    pub fn kind(&self) -> StoreErrorKind {
        let Some(err) = self.driver_error() else {
            return StoreErrorKind::Unknown;
        };
        match err.kind.as_ref() {
            ErrorKind::Authentication { .. } => StoreErrorKind::PermissionDenied,
            ErrorKind::Command(command) if UNAUTHORIZED_CODES.contains(&command.code) => {
                StoreErrorKind::PermissionDenied
            }
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => StoreErrorKind::Connectivity,
            _ => StoreErrorKind::Unknown,
        }
    }
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::classified(err.kind(), err.to_string(), err)
    }
}
