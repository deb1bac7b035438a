use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{request_store::RequestStore, storage::StorageError},
    services::queue_sync,
    state::{SharedState, SyncFailure},
};

const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Delays used by the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTiming {
    /// First wait after a failed connect or reconnect; doubles up to `max_delay`.
    pub initial_delay: Duration,
    /// Ceiling for the backoff.
    pub max_delay: Duration,
    /// Pause between two health checks of a live store.
    pub health_poll: Duration,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll: Duration::from_secs(5),
        }
    }
}

/// Connect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable. Observers get a fresh snapshot whenever storage
/// comes (back) up and a connectivity failure when it goes away.
pub async fn run<F, Fut>(state: SharedState, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RequestStore>, StorageError>> + Send,
{
    run_with_timing(state, connect, SupervisorTiming::default()).await
}

/// [`run`] with explicit delays.
///
/// Every healthy poll also reconciles the live view with the store, so a
/// stale snapshot or a failure left behind by an earlier refresh is corrected
/// without waiting for the next write.
pub async fn run_with_timing<F, Fut>(state: SharedState, mut connect: F, timing: SupervisorTiming)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RequestStore>, StorageError>> + Send,
{
    let SupervisorTiming {
        initial_delay,
        max_delay,
        health_poll,
    } = timing;
    let mut delay = initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_request_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                queue_sync::refresh_after_write(&state).await;
                delay = initial_delay;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded().await {
                                info!("storage healthy again; leaving degraded mode");
                                state.install_request_store(store.clone()).await;
                            }
                            queue_sync::reconcile(&state).await;
                            sleep(health_poll).await;
                        }
                        Err(err) => {
                            state
                                .sync()
                                .publish_failure(SyncFailure::new(err.kind(), err.to_string()));

                            let mut attempt = 0;
                            let mut reconnect_delay = initial_delay;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering degraded mode"
                                            );
                                            state.clear_request_store().await;
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        };
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(max_delay);
                                    }
                                }
                            }

                            if reconnected {
                                state.install_request_store(store.clone()).await;
                                queue_sync::refresh_after_write(&state).await;
                                sleep(health_poll).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{request_store::memory::MemoryRequestStore, storage::StoreErrorKind},
        services::handoff::LoggingOpener,
        state::{AppState, SyncUpdate},
    };

    #[tokio::test]
    async fn successful_connect_installs_store_and_publishes() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        let mut updates = state.sync().watch();

        let task = tokio::spawn(run(state.clone(), || async {
            Ok::<_, StorageError>(Arc::new(MemoryRequestStore::new()) as Arc<dyn RequestStore>)
        }));

        timeout(
            Duration::from_secs(1),
            updates.wait_for(|update| matches!(update, SyncUpdate::Snapshot(_))),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!state.is_degraded().await);
        task.abort();
    }

    #[tokio::test]
    async fn healthy_poll_replaces_a_stale_failure() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        let store = MemoryRequestStore::new();
        let timing = SupervisorTiming {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            health_poll: Duration::from_millis(10),
        };
        let task = tokio::spawn(run_with_timing(
            state.clone(),
            {
                let store = store.clone();
                move || {
                    let store = store.clone();
                    async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RequestStore>) }
                }
            },
            timing,
        ));
        let mut updates = state.sync().watch();
        timeout(
            Duration::from_secs(1),
            updates.wait_for(|update| matches!(update, SyncUpdate::Snapshot(_))),
        )
        .await
        .unwrap()
        .unwrap();

        // A refresh that failed after a write leaves a failure behind while
        // the store itself stays healthy.
        state
            .sync()
            .publish_failure(SyncFailure::new(StoreErrorKind::Unknown, "refresh failed"));
        timeout(
            Duration::from_secs(1),
            updates.wait_for(|update| matches!(update, SyncUpdate::Snapshot(_))),
        )
        .await
        .unwrap()
        .unwrap();
        task.abort();
    }
}
