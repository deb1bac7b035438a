use crate::{
    dto::session::SessionResponse,
    error::ServiceError,
    state::{SharedState, queue::SessionState},
};

/// Gate state for patrons deciding whether the request form is reachable.
///
/// Without storage the last published snapshot answers, so a brief outage does
/// not flip every device to "closed".
pub async fn session_status(state: &SharedState) -> Result<SessionResponse, ServiceError> {
    if let Some(reason) = state.misconfiguration() {
        return Ok(SessionResponse {
            open: false,
            degraded: true,
            unavailable_reason: Some(reason.to_owned()),
        });
    }

    match state.request_store().await {
        Some(store) => {
            let session: SessionState = store.session().await?.into();
            Ok(SessionResponse {
                open: session.open,
                degraded: false,
                unavailable_reason: None,
            })
        }
        None => {
            let open = state
                .sync()
                .latest_snapshot()
                .map(|snapshot| snapshot.is_open())
                .unwrap_or(SessionState::default().open);
            Ok(SessionResponse {
                open,
                degraded: true,
                unavailable_reason: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::request_store::RequestStore,
        services::handoff::LoggingOpener,
        state::{AppState, queue::QueueSnapshot, tests::memory_state},
    };

    #[tokio::test]
    async fn reports_store_gate() {
        let (state, store) = memory_state().await;
        assert!(session_status(&state).await.unwrap().open);

        store.set_session_open(false).await.unwrap();
        let status = session_status(&state).await.unwrap();
        assert!(!status.open);
        assert!(!status.degraded);
    }

    #[tokio::test]
    async fn degraded_mode_falls_back_to_last_snapshot() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        state.sync().publish_snapshot(QueueSnapshot::new(
            SessionState { open: false },
            Vec::new(),
        ));

        let status = session_status(&state).await.unwrap();
        assert!(status.degraded);
        assert!(!status.open);
        assert!(status.unavailable_reason.is_none());
    }

    #[tokio::test]
    async fn misconfiguration_is_reported() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        state.mark_misconfigured("unknown STORAGE_BACKEND `redis`");

        let status = session_status(&state).await.unwrap();
        assert!(status.degraded);
        assert_eq!(
            status.unavailable_reason.as_deref(),
            Some("unknown STORAGE_BACKEND `redis`")
        );
    }
}
