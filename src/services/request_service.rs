//! Patron-side request lifecycle: submit, withdraw and list one's own requests.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{models::NewSongRequest, request_store::DeleteOutcome},
    error::ServiceError,
    services::{
        handoff::{self, HandoffReport},
        queue_sync,
    },
    state::{
        SharedState,
        lifecycle::{
            Actor, admit_submission, authorize_delete, normalize_dedication, validate_submission,
        },
        queue::{Identity, SessionState, Song, SongRequest},
    },
};

/// A stored request and what happened to the staff notification.
#[derive(Debug, Clone)]
pub struct Submission {
    pub request: SongRequest,
    pub handoff: HandoffReport,
}

/// Validate, admit through the session gate, store, publish, then notify staff.
///
/// A closed session is rejected before anything is written and the hand-off
/// is never attempted.
pub async fn submit(
    state: &SharedState,
    identity: Identity,
    song: Song,
    dedication: Option<String>,
) -> Result<Submission, ServiceError> {
    validate_submission(&identity, &song)?;
    let store = state.require_request_store().await?;

    let created = {
        let _admission = state.admission().await;
        let session: SessionState = store.session().await?.into();
        admit_submission(&session)?;
        store
            .create_request(NewSongRequest {
                name: identity.name,
                table: identity.table,
                title: song.title,
                artist: song.artist,
                dedication: normalize_dedication(dedication),
                submitted_at: SystemTime::now(),
            })
            .await?
    };
    info!(request_id = %created.id, table = %created.table, "song request submitted");

    queue_sync::refresh_after_write(state).await;

    let request = SongRequest::from(created);
    let handoff =
        handoff::dispatch(state.opener().as_ref(), state.config().staff_contact(), &request).await;

    Ok(Submission { request, handoff })
}

/// Withdraw one of the patron's own pending requests. Unknown ids are a no-op.
pub async fn delete_own(
    state: &SharedState,
    identity: Identity,
    id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_request_store().await?;
    let actor = Actor::Patron(identity);

    match store.delete_request(id, actor.delete_guard()).await? {
        DeleteOutcome::Deleted => {
            info!(request_id = %id, "patron withdrew request");
            queue_sync::refresh_after_write(state).await;
            Ok(())
        }
        DeleteOutcome::Missing => {
            debug!(request_id = %id, "delete of unknown request ignored");
            Ok(())
        }
        DeleteOutcome::Rejected => match store.find_request(id).await? {
            Some(entity) => {
                authorize_delete(&actor, &entity.into())?;
                Err(ServiceError::InvalidState(
                    "request changed while it was being removed".into(),
                ))
            }
            None => Ok(()),
        },
    }
}

/// Requests whose requester matches `identity` exactly, newest first.
pub async fn my_requests(
    state: &SharedState,
    identity: &Identity,
) -> Result<Vec<SongRequest>, ServiceError> {
    let store = state.require_request_store().await?;
    let snapshot = queue_sync::load(store.as_ref()).await?;
    Ok(snapshot
        .patron_view(identity)
        .into_iter()
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            request_store::{RequestStore, memory::MemoryRequestStore},
            storage::StoreErrorKind,
        },
        services::{admin_service, handoff::tests::RecordingOpener},
        state::{AppState, SyncUpdate, queue::RequestStatus},
    };

    async fn state_with_opener() -> (SharedState, MemoryRequestStore, RecordingOpener) {
        let store = MemoryRequestStore::new();
        let opener = RecordingOpener::default();
        let state = AppState::new(AppConfig::default(), Arc::new(opener.clone()));
        state.install_request_store(Arc::new(store.clone())).await;
        (state, store, opener)
    }

    fn ana() -> Identity {
        Identity::new("Ana", "5")
    }

    fn evidencias() -> Song {
        Song::new("Evidências", "Chitãozinho & Xororó")
    }

    #[tokio::test]
    async fn submitted_request_shows_once_in_personal_view() {
        let (state, _, opener) = state_with_opener().await;

        let submission = submit(&state, ana(), evidencias(), None).await.unwrap();
        assert_eq!(submission.request.status, RequestStatus::Pending);
        assert_eq!(opener.count(), 1);

        let mine = my_requests(&state, &ana()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].song, evidencias());
        assert_eq!(mine[0].status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn closed_session_creates_nothing_and_skips_handoff() {
        let (state, store, opener) = state_with_opener().await;
        store.set_session_open(false).await.unwrap();

        let err = submit(&state, ana(), evidencias(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::SessionClosed));
        assert!(store.list_requests().await.unwrap().is_empty());
        assert_eq!(opener.count(), 0);
    }

    #[tokio::test]
    async fn blank_fields_never_reach_the_store() {
        let (state, store, opener) = state_with_opener().await;
        let err = submit(&state, Identity::new("Ana", " "), evidencias(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(store.list_requests().await.unwrap().is_empty());
        assert_eq!(opener.count(), 0);
    }

    #[tokio::test]
    async fn fields_round_trip_through_the_sync_layer() {
        let (state, _, _) = state_with_opener().await;
        let identity = Identity::new(" Ana ", "Mesa 5");
        let song = Song::new("Anna Júlia ", "Los Hermanos");

        submit(
            &state,
            identity.clone(),
            song.clone(),
            Some("para você ♥".into()),
        )
        .await
        .unwrap();

        let SyncUpdate::Snapshot(snapshot) = state.sync().current() else {
            panic!("no snapshot published");
        };
        let delivered = &snapshot.requests()[0];
        assert_eq!(delivered.requester, identity);
        assert_eq!(delivered.song, song);
        assert_eq!(delivered.dedication.as_deref(), Some("para você ♥"));
    }

    #[tokio::test]
    async fn failed_handoff_keeps_the_request() {
        let store = MemoryRequestStore::new();
        let opener = RecordingOpener {
            fail: true,
            ..Default::default()
        };
        let state = AppState::new(AppConfig::default(), Arc::new(opener));
        state.install_request_store(Arc::new(store.clone())).await;

        let submission = submit(&state, ana(), evidencias(), None).await.unwrap();
        assert!(!submission.handoff.delivered);
        assert_eq!(store.list_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_leaves_queue_unchanged() {
        let (state, store, opener) = state_with_opener().await;
        store.fail_writes(Some(StoreErrorKind::PermissionDenied)).await;

        let err = submit(&state, ana(), evidencias(), None).await.unwrap_err();
        match err {
            ServiceError::Unavailable(source) => {
                assert_eq!(source.kind(), StoreErrorKind::PermissionDenied)
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(opener.count(), 0);
    }

    #[tokio::test]
    async fn patron_withdraws_only_own_pending_request() {
        let (state, store, _) = state_with_opener().await;
        let submission = submit(&state, ana(), evidencias(), None).await.unwrap();
        let id = submission.request.id;

        let err = delete_own(&state, Identity::new("Bia", "5"), id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        admin_service::advance(&state, id, None).await.unwrap();
        let err = delete_own(&state, ana(), id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(store.list_requests().await.unwrap().len(), 1);

        admin_service::advance(&state, id, None).await.unwrap();
        admin_service::advance(&state, id, None).await.unwrap();
        delete_own(&state, ana(), id).await.unwrap();
        assert!(store.list_requests().await.unwrap().is_empty());

        // Already gone: no-op.
        delete_own(&state, ana(), id).await.unwrap();
    }

    #[tokio::test]
    async fn same_identity_patrons_share_one_view() {
        let (state, _, _) = state_with_opener().await;
        let joao = Identity::new("João", "5");
        submit(&state, joao.clone(), Song::new("Wonderwall", "Oasis"), None)
            .await
            .unwrap();
        submit(&state, joao.clone(), Song::new("It's My Life", "Bon Jovi"), None)
            .await
            .unwrap();
        submit(&state, Identity::new("joão", "5"), evidencias(), None)
            .await
            .unwrap();

        assert_eq!(my_requests(&state, &joao).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn degraded_mode_rejects_submissions() {
        let state = AppState::new(AppConfig::default(), Arc::new(RecordingOpener::default()));
        let err = submit(&state, ana(), evidencias(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
