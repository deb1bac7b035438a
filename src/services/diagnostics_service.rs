//! "Test connection" action: a write-then-delete probe against the store.

use tracing::{info, warn};

use crate::{
    dao::storage::StoreErrorKind,
    dto::diagnostics::{ConnectionStatus, ConnectionTestResponse},
    state::SharedState,
};

fn remediation(kind: StoreErrorKind) -> &'static str {
    match kind {
        StoreErrorKind::Connectivity => {
            "Could not reach the database. Check the network connection and try again."
        }
        StoreErrorKind::PermissionDenied => {
            "The database refused the write. Review its access rules for the requests collection."
        }
        StoreErrorKind::Unknown => {
            "The database returned an unexpected error. Contact support with the server logs."
        }
    }
}

/// Probe read/write access and describe what to do if it fails.
pub async fn test_connection(state: &SharedState) -> ConnectionTestResponse {
    if let Some(reason) = state.misconfiguration() {
        return ConnectionTestResponse {
            status: ConnectionStatus::Unknown,
            message: format!("Storage is misconfigured: {reason}"),
        };
    }
    let Some(store) = state.request_store().await else {
        return ConnectionTestResponse {
            status: ConnectionStatus::Connectivity,
            message: remediation(StoreErrorKind::Connectivity).to_owned(),
        };
    };

    match store.probe().await {
        Ok(()) => {
            info!("connection probe succeeded");
            ConnectionTestResponse {
                status: ConnectionStatus::Ok,
                message: "Read and write access confirmed.".to_owned(),
            }
        }
        Err(err) => {
            warn!(error = %err, kind = ?err.kind(), "connection probe failed");
            ConnectionTestResponse {
                status: err.kind().into(),
                message: remediation(err.kind()).to_owned(),
            }
        }
    }
}
