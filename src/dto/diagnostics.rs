use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::storage::StoreErrorKind;

/// Result class of a connection probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Ok,
    Connectivity,
    PermissionDenied,
    Unknown,
}

impl From<StoreErrorKind> for ConnectionStatus {
    fn from(kind: StoreErrorKind) -> Self {
        match kind {
            StoreErrorKind::Connectivity => ConnectionStatus::Connectivity,
            StoreErrorKind::PermissionDenied => ConnectionStatus::PermissionDenied,
            StoreErrorKind::Unknown => ConnectionStatus::Unknown,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionTestResponse {
    pub status: ConnectionStatus,
    /// What to do about it.
    pub message: String,
}
