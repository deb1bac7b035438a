//! Re-reads the request store and publishes complete snapshots to the sync hub.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::{request_store::RequestStore, storage::StorageResult},
    error::ServiceError,
    state::{SharedState, SyncFailure, queue::QueueSnapshot},
};

/// Read the gate and every request in one go.
pub async fn load(store: &dyn RequestStore) -> StorageResult<QueueSnapshot> {
    let (session, requests) = tokio::try_join!(store.session(), store.list_requests())?;
    Ok(QueueSnapshot::new(
        session.into(),
        requests.into_iter().map(Into::into).collect(),
    ))
}

/// Load a fresh snapshot and publish it, or publish the classified failure.
///
/// Refreshes run one at a time: a load that started before a write is always
/// published before the load that observes it.
pub async fn refresh(state: &SharedState) -> Result<Arc<QueueSnapshot>, ServiceError> {
    let store = state.require_request_store().await?;
    let _guard = state.refresh_guard().await;
    let snapshot = load_or_publish_failure(state, store.as_ref()).await?;
    debug!(
        open = snapshot.is_open(),
        requests = snapshot.len(),
        "publishing queue snapshot"
    );
    Ok(state.sync().publish_snapshot(snapshot))
}

/// Refresh after a committed write. The write already succeeded, so a failed
/// refresh only reaches observers through the published failure.
pub async fn refresh_after_write(state: &SharedState) {
    if let Err(err) = refresh(state).await {
        warn!(error = %err, "failed to publish queue snapshot after write");
    }
}

/// Re-read the store and publish only if observers hold something else,
/// such as an earlier failure. Driven by the storage health poll.
pub async fn reconcile(state: &SharedState) {
    let Some(store) = state.request_store().await else {
        return;
    };
    let _guard = state.refresh_guard().await;
    match load_or_publish_failure(state, store.as_ref()).await {
        Ok(snapshot) => {
            if state.sync().publish_snapshot_if_changed(snapshot) {
                debug!("live view reconciled with storage");
            }
        }
        Err(err) => warn!(error = %err, "failed to reconcile the live view"),
    }
}

async fn load_or_publish_failure(
    state: &SharedState,
    store: &dyn RequestStore,
) -> StorageResult<QueueSnapshot> {
    load(store).await.inspect_err(|err| {
        state
            .sync()
            .publish_failure(SyncFailure::new(err.kind(), err.to_string()));
    })
}
