pub mod lifecycle;
pub mod queue;
pub mod sync;

use std::{
    sync::{Arc, OnceLock},
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig, dao::request_store::RequestStore, error::ServiceError,
    services::handoff::DeepLinkOpener,
};

pub use self::sync::{Subscription, SubscriptionSlot, SyncFailure, SyncHub, SyncUpdate};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: storage handle, live sync hub and admin sessions.
pub struct AppState {
    request_store: RwLock<Option<Arc<dyn RequestStore>>>,
    sync: SyncHub,
    /// Held across a snapshot load and its publish.
    refresh_lock: Mutex<()>,
    degraded: watch::Sender<bool>,
    misconfiguration: OnceLock<String>,
    admin_tokens: DashMap<String, SystemTime>,
    config: AppConfig,
    opener: Arc<dyn DeepLinkOpener>,
    /// Submissions hold the read side, gate flips the write side.
    session_gate: RwLock<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, opener: Arc<dyn DeepLinkOpener>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            request_store: RwLock::new(None),
            sync: SyncHub::new(),
            refresh_lock: Mutex::new(()),
            degraded: degraded_tx,
            misconfiguration: OnceLock::new(),
            admin_tokens: DashMap::new(),
            config,
            opener,
            session_gate: RwLock::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current request store, if one is installed.
    pub async fn request_store(&self) -> Option<Arc<dyn RequestStore>> {
        let guard = self.request_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current request store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_request_store(&self) -> Result<Arc<dyn RequestStore>, ServiceError> {
        self.request_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new request store implementation and leave degraded mode.
    pub async fn install_request_store(&self, store: Arc<dyn RequestStore>) {
        {
            let mut guard = self.request_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current request store and enter degraded mode.
    pub async fn clear_request_store(&self) {
        {
            let mut guard = self.request_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.request_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Record that the storage backend can never come up with the current settings.
    pub fn mark_misconfigured(&self, reason: impl Into<String>) {
        if self.misconfiguration.set(reason.into()).is_err() {
            warn!("storage misconfiguration already recorded");
        }
    }

    /// Reason the service is permanently degraded, if any.
    pub fn misconfiguration(&self) -> Option<&str> {
        self.misconfiguration.get().map(String::as_str)
    }

    pub fn sync(&self) -> &SyncHub {
        &self.sync
    }

    /// Serialize snapshot refreshes so an older read can never be published
    /// after a newer one.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn opener(&self) -> Arc<dyn DeepLinkOpener> {
        self.opener.clone()
    }

    /// Active admin tokens and the time they were issued.
    pub fn admin_tokens(&self) -> &DashMap<String, SystemTime> {
        &self.admin_tokens
    }

    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Shared side of the session gate; held while a submission is admitted and written.
    pub async fn admission(&self) -> RwLockReadGuard<'_, ()> {
        self.session_gate.read().await
    }

    /// Run a gate transition exclusively, bounded by the transition timeout.
    pub async fn run_gate_transition<F, Fut, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.session_gate.write().await;
        let work_future = work();
        let outcome = match self.transition_timeout {
            Some(limit) => match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?limit, "session gate transition timed out");
                    Err(ServiceError::Timeout)
                }
            },
            None => work_future.await,
        };
        drop(gate);
        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{dao::request_store::memory::MemoryRequestStore, services::handoff::LoggingOpener};

    /// State backed by a fresh in-memory store, out of degraded mode.
    pub(crate) async fn memory_state() -> (SharedState, MemoryRequestStore) {
        let store = MemoryRequestStore::new();
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        state.install_request_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded().await);
        assert!(*watcher.borrow_and_update());

        state
            .install_request_store(Arc::new(MemoryRequestStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_request_store().await;
        assert!(state.is_degraded().await);
    }

    #[tokio::test]
    async fn misconfiguration_is_recorded_once() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        assert_eq!(state.misconfiguration(), None);
        state.mark_misconfigured("MONGO_URI missing");
        state.mark_misconfigured("ignored");
        assert_eq!(state.misconfiguration(), Some("MONGO_URI missing"));
    }

    #[tokio::test]
    async fn gate_transition_errors_pass_through() {
        let (state, _) = memory_state().await;
        let result: Result<(), _> = state
            .run_gate_transition(|| async { Err(ServiceError::InvalidInput("nope".into())) })
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

        let value = state.run_gate_transition(|| async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
