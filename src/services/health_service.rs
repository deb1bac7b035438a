use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// `ok` while a store is installed, `degraded` otherwise. Health check
/// failures are only logged; the supervisor decides when to degrade.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_request_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded(state.misconfiguration().map(str::to_owned))
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::health::HealthStatus,
        services::handoff::LoggingOpener,
        state::{AppState, tests::memory_state},
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        let (state, _) = memory_state().await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn misconfiguration_reason_is_exposed() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        state.mark_misconfigured("MONGO_URI is not set");
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.reason.as_deref(), Some("MONGO_URI is not set"));
    }
}
