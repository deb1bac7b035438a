//! Business logic powering the admin REST routes: status changes, removals and
//! the session gate, including the purge that comes with closing it.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::request_store::{DeleteGuard, DeleteOutcome, PurgeReport, StatusUpdate},
    error::ServiceError,
    services::queue_sync,
    state::{
        SharedState,
        queue::{QueueSnapshot, RequestStatus},
    },
};

/// Status change applied by [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advanced {
    /// Request that moved.
    pub id: Uuid,
    /// Status before the change.
    pub previous: RequestStatus,
    /// Status now stored.
    pub status: RequestStatus,
}

/// Move a request one step along pending, playing, completed and back to pending.
///
/// With `expected`, the change only applies if the stored status still matches,
/// so two operators tapping the same row cannot skip a step.
pub async fn advance(
    state: &SharedState,
    id: Uuid,
    expected: Option<RequestStatus>,
) -> Result<Advanced, ServiceError> {
    let store = state.require_request_store().await?;
    let current = match expected {
        Some(status) => status,
        None => {
            store
                .find_request(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("request `{id}`")))?
                .status
        }
    };
    let next = current.advance();

    match store.set_status(id, current, next).await? {
        StatusUpdate::Updated => {
            info!(request_id = %id, from = %current, to = %next, "request status advanced");
            queue_sync::refresh_after_write(state).await;
            Ok(Advanced {
                id,
                previous: current,
                status: next,
            })
        }
        StatusUpdate::Missing => Err(ServiceError::NotFound(format!("request `{id}`"))),
        StatusUpdate::Conflict(actual) => Err(ServiceError::InvalidState(format!(
            "request is {actual}, expected {current}"
        ))),
    }
}

/// Remove any request regardless of status. Returns whether something was removed.
pub async fn delete(state: &SharedState, id: Uuid) -> Result<bool, ServiceError> {
    let store = state.require_request_store().await?;
    match store.delete_request(id, DeleteGuard::Any).await? {
        DeleteOutcome::Deleted => {
            info!(request_id = %id, "admin removed request");
            queue_sync::refresh_after_write(state).await;
            Ok(true)
        }
        DeleteOutcome::Missing | DeleteOutcome::Rejected => Ok(false),
    }
}

/// Admit new requests again. Existing requests are left alone.
pub async fn open_session(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_request_store().await?;
    let result = state
        .run_gate_transition(|| async move {
            store.set_session_open(true).await?;
            Ok(())
        })
        .await;
    queue_sync::refresh_after_write(state).await;
    result?;

    info!("karaoke session opened");
    Ok(())
}

/// Close the gate and purge the whole queue as one operation.
///
/// `confirm` is the operator's explicit acknowledgement of the purge. On
/// failure the outcome is reported as such and observers get whatever the
/// store now holds.
pub async fn close_session(
    state: &SharedState,
    confirm: bool,
) -> Result<PurgeReport, ServiceError> {
    if !confirm {
        return Err(ServiceError::InvalidInput(
            "closing the session deletes every request; resend with confirm=true".into(),
        ));
    }

    let store = state.require_request_store().await?;
    let result = state
        .run_gate_transition(|| async move { Ok(store.close_session().await?) })
        .await;
    queue_sync::refresh_after_write(state).await;

    match result {
        Ok(report) => {
            info!(purged = report.deleted, "karaoke session closed");
            Ok(report)
        }
        Err(err) => {
            warn!(error = %err, "closing the session failed");
            Err(err)
        }
    }
}

/// Current queue straight from the store.
pub async fn queue(state: &SharedState) -> Result<QueueSnapshot, ServiceError> {
    let store = state.require_request_store().await?;
    Ok(queue_sync::load(store.as_ref()).await?)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        dao::{
            models::NewSongRequest,
            request_store::RequestStore,
            storage::{StorageError, StoreErrorKind},
        },
        state::{SyncUpdate, tests::memory_state},
    };

    async fn seed(store: &dyn RequestStore, name: &str) -> Uuid {
        store
            .create_request(NewSongRequest {
                name: name.into(),
                table: "5".into(),
                title: "Bohemian Rhapsody".into(),
                artist: "Queen".into(),
                dedication: None,
                submitted_at: SystemTime::now(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn advance_cycles_and_never_skips() {
        let (state, store) = memory_state().await;
        let r1 = seed(&store, "Ana").await;

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(advance(&state, r1, None).await.unwrap().status);
        }
        assert_eq!(
            seen,
            vec![
                RequestStatus::Playing,
                RequestStatus::Completed,
                RequestStatus::Pending,
                RequestStatus::Playing,
            ]
        );
    }

    #[tokio::test]
    async fn stale_expected_status_is_a_conflict() {
        let (state, store) = memory_state().await;
        let id = seed(&store, "Ana").await;

        advance(&state, id, Some(RequestStatus::Pending)).await.unwrap();
        let err = advance(&state, id, Some(RequestStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(
            store.find_request(id).await.unwrap().unwrap().status,
            RequestStatus::Playing
        );
    }

    #[tokio::test]
    async fn advancing_unknown_request_changes_nothing() {
        let (state, _) = memory_state().await;
        let err = advance(&state, Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn admin_delete_reaches_every_view() {
        let (state, store) = memory_state().await;
        let r1 = seed(&store, "Ana").await;
        advance(&state, r1, None).await.unwrap();

        assert!(delete(&state, r1).await.unwrap());
        let SyncUpdate::Snapshot(snapshot) = state.sync().current() else {
            panic!("no snapshot published");
        };
        assert!(snapshot.find(r1).is_none());
        assert!(!delete(&state, r1).await.unwrap());
    }

    #[tokio::test]
    async fn close_requires_confirmation() {
        let (state, store) = memory_state().await;
        seed(&store, "Ana").await;

        let err = close_session(&state, false).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(store.session().await.unwrap().open);
        assert_eq!(store.list_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_converges_to_closed_and_empty() {
        let (state, store) = memory_state().await;
        seed(&store, "Ana").await;
        seed(&store, "Bia").await;

        let report = close_session(&state, true).await.unwrap();
        assert_eq!(report.deleted, 2);

        let SyncUpdate::Snapshot(snapshot) = state.sync().current() else {
            panic!("no snapshot published");
        };
        assert!(!snapshot.is_open());
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn failed_close_is_reported_and_changes_nothing() {
        let (state, store) = memory_state().await;
        seed(&store, "Ana").await;
        store.fail_writes(Some(StoreErrorKind::PermissionDenied)).await;

        let err = close_session(&state, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        let snapshot = queue(&state).await.unwrap();
        assert!(snapshot.is_open());
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn partial_purge_is_an_error_and_observers_see_the_leftovers() {
        let (state, store) = memory_state().await;
        for name in ["Ana", "Bia", "Caio"] {
            seed(&store, name).await;
        }
        store.limit_purge(Some(2)).await;

        let err = close_session(&state, true).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unavailable(StorageError::BatchIncomplete { failed: 1, total: 3 })
        ));

        let SyncUpdate::Snapshot(snapshot) = state.sync().current() else {
            panic!("no snapshot published");
        };
        assert!(!snapshot.is_open());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(*snapshot, queue(&state).await.unwrap());
    }

    #[tokio::test]
    async fn reopening_keeps_existing_requests() {
        let (state, store) = memory_state().await;
        store.set_session_open(false).await.unwrap();
        seed(&store, "Ana").await;

        open_session(&state).await.unwrap();
        let snapshot = queue(&state).await.unwrap();
        assert!(snapshot.is_open());
        assert_eq!(snapshot.len(), 1);
    }
}
