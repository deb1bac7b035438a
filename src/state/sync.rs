//! Live fan-out of complete queue snapshots to every observer.
//!
//! The hub only ever holds the latest value: a slow observer skips straight to
//! the newest snapshot instead of replaying intermediate ones.

use std::{
    fmt,
    sync::Arc,
};

use tokio::{sync::watch, task::JoinHandle};

use crate::{dao::storage::StoreErrorKind, state::queue::QueueSnapshot};

/// A classified failure of the live view, delivered instead of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Classification driving the banner shown to users.
    pub kind: StoreErrorKind,
    /// Backend error text, for logs and diagnostics.
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Latest state of the shared queue as known to this instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncUpdate {
    /// Nothing has been read from storage yet.
    #[default]
    Waiting,
    Snapshot(Arc<QueueSnapshot>),
    Failed(SyncFailure),
}

/// Broadcasts queue snapshots and sync failures over a `watch` channel.
pub struct SyncHub {
    updates: watch::Sender<SyncUpdate>,
    latest: watch::Sender<Option<Arc<QueueSnapshot>>>,
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHub {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(SyncUpdate::Waiting);
        let (latest, _) = watch::channel(None);
        Self { updates, latest }
    }

    /// Publish a complete snapshot, superseding whatever was published before.
    pub fn publish_snapshot(&self, snapshot: QueueSnapshot) -> Arc<QueueSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.latest.send_replace(Some(snapshot.clone()));
        self.updates
            .send_replace(SyncUpdate::Snapshot(snapshot.clone()));
        snapshot
    }

    /// Publish a snapshot only when it differs from the current update. A
    /// published failure always counts as different.
    pub fn publish_snapshot_if_changed(&self, snapshot: QueueSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        self.latest.send_replace(Some(snapshot.clone()));
        self.updates.send_if_modified(|current| match current {
            SyncUpdate::Snapshot(existing) if *existing == snapshot => false,
            _ => {
                *current = SyncUpdate::Snapshot(snapshot);
                true
            }
        })
    }

    /// Publish a failure. The last good snapshot stays available through
    /// [`SyncHub::latest_snapshot`].
    pub fn publish_failure(&self, failure: SyncFailure) {
        self.updates.send_replace(SyncUpdate::Failed(failure));
    }

    pub fn current(&self) -> SyncUpdate {
        self.updates.borrow().clone()
    }

    /// Last successfully published snapshot, even if a failure came after it.
    pub fn latest_snapshot(&self) -> Option<Arc<QueueSnapshot>> {
        self.latest.borrow().clone()
    }

    /// Raw receiver for callers that want to drive their own loop (the SSE stream).
    pub fn watch(&self) -> watch::Receiver<SyncUpdate> {
        self.updates.subscribe()
    }

    /// Register observer callbacks.
    ///
    /// The current value is delivered immediately (unless nothing was read yet),
    /// then every subsequent update. Dropping the returned [`Subscription`]
    /// releases the forwarder.
    pub fn subscribe<U, E>(&self, mut on_update: U, mut on_error: E) -> Subscription
    where
        U: FnMut(Arc<QueueSnapshot>) + Send + 'static,
        E: FnMut(SyncFailure) + Send + 'static,
    {
        let mut rx = self.updates.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                let update = rx.borrow_and_update().clone();
                match update {
                    SyncUpdate::Waiting => {}
                    SyncUpdate::Snapshot(snapshot) => on_update(snapshot),
                    SyncUpdate::Failed(failure) => on_error(failure),
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Subscription {
            handle: Some(handle),
        }
    }
}

/// Handle to a live observer registration.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivering updates to this observer.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Holds at most one subscription per instance.
#[derive(Debug, Default)]
pub struct SubscriptionSlot {
    current: Option<Subscription>,
}

impl SubscriptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `subscription`, releasing the one it supersedes.
    pub fn replace(&mut self, subscription: Subscription) {
        if let Some(previous) = self.current.replace(subscription) {
            previous.unsubscribe();
        }
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.unsubscribe();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(Subscription::is_active)
    }
}
