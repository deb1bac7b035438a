use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::storage::StoreErrorKind, state::SyncFailure};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the live view could not be refreshed from storage.
pub struct SyncErrorEvent {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl From<&SyncFailure> for SyncErrorEvent {
    fn from(failure: &SyncFailure) -> Self {
        Self {
            kind: failure.kind,
            message: failure.message.clone(),
        }
    }
}
