use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        common::QueueSnapshotDto,
        sse::{ServerEvent, SyncErrorEvent, SystemStatus},
    },
    state::{SharedState, SyncUpdate},
};

pub const QUEUE_SNAPSHOT_EVENT: &str = "queue.snapshot";
pub const SYNC_ERROR_EVENT: &str = "sync.error";
pub const SYSTEM_STATUS_EVENT: &str = "system.status";

/// Translate a sync update into the SSE event observers receive.
pub fn update_event(update: &SyncUpdate) -> Option<ServerEvent> {
    let event = match update {
        SyncUpdate::Waiting => return None,
        SyncUpdate::Snapshot(snapshot) => ServerEvent::json(
            Some(QUEUE_SNAPSHOT_EVENT.to_string()),
            &QueueSnapshotDto::from(snapshot.as_ref()),
        ),
        SyncUpdate::Failed(failure) => ServerEvent::json(
            Some(SYNC_ERROR_EVENT.to_string()),
            &SyncErrorEvent::from(failure),
        ),
    };
    event
        .inspect_err(|err| warn!(error = %err, "failed to serialise sync event"))
        .ok()
}

pub fn status_event(degraded: bool) -> Option<ServerEvent> {
    ServerEvent::json(
        Some(SYSTEM_STATUS_EVENT.to_string()),
        &SystemStatus { degraded },
    )
    .inspect_err(|err| warn!(error = %err, "failed to serialise status event"))
    .ok()
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Live queue stream: degraded status first, then the current snapshot (or
/// failure), then every later change of either.
pub fn queue_stream(
    state: &SharedState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let updates = state.sync().watch();
    let degraded = state.degraded_watcher();
    forward(updates, degraded)
}

fn forward(
    mut updates: watch::Receiver<SyncUpdate>,
    mut degraded: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let initial = [
            status_event(*degraded.borrow_and_update()),
            update_event(&updates.borrow_and_update()),
        ];
        for payload in initial.into_iter().flatten() {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    update_event(&updates.borrow_and_update())
                }
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    status_event(*degraded.borrow_and_update())
                }
            };

            if let Some(payload) = payload {
                if tx.send(Ok(to_event(payload))).await.is_err() {
                    break;
                }
            }
        }

        info!("queue SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::storage::StoreErrorKind,
        state::{
            SyncFailure,
            queue::{QueueSnapshot, SessionState, tests::request_at},
        },
    };
    use std::sync::Arc;

    #[test]
    fn waiting_produces_no_event() {
        assert!(update_event(&SyncUpdate::Waiting).is_none());
    }

    #[test]
    fn snapshot_event_carries_the_whole_queue() {
        let snapshot = QueueSnapshot::new(
            SessionState { open: false },
            vec![request_at(1, "Ana", "5", "Evidências")],
        );
        let event = update_event(&SyncUpdate::Snapshot(Arc::new(snapshot))).unwrap();
        assert_eq!(event.event.as_deref(), Some(QUEUE_SNAPSHOT_EVENT));

        let json: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(json["open"], false);
        assert_eq!(json["requests"][0]["title"], "Evidências");
        assert_eq!(json["requests"][0]["status"], "pending");
    }

    #[test]
    fn failure_event_carries_the_kind() {
        let event = update_event(&SyncUpdate::Failed(SyncFailure::new(
            StoreErrorKind::PermissionDenied,
            "denied",
        )))
        .unwrap();
        assert_eq!(event.event.as_deref(), Some(SYNC_ERROR_EVENT));
        let json: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(json["kind"], "permission_denied");
    }

    #[test]
    fn status_event_reports_degraded_flag() {
        let event = status_event(true).unwrap();
        assert_eq!(event.event.as_deref(), Some(SYSTEM_STATUS_EVENT));
        assert_eq!(event.data, r#"{"degraded":true}"#);
    }

    #[tokio::test]
    async fn stream_outlives_the_state_handle_it_was_built_from() {
        let sse = {
            let (state, _) = crate::state::tests::memory_state().await;
            queue_stream(&state)
        };
        drop(sse);
    }
}
