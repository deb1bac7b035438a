use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::{
    dao::storage::StoreErrorKind,
    state::{
        SubscriptionSlot, SyncFailure, SyncHub, SyncUpdate,
        queue::{Identity, QueueSnapshot, SongRequest},
    },
};

/// Error banner shown while the live view cannot be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Connectivity,
    AccessDenied,
    Unknown,
}

impl Banner {
    /// Short remediation hint for staff.
    pub fn message(self) -> &'static str {
        match self {
            Banner::Connectivity => "Sem conexão com o banco de dados. Tentando reconectar...",
            Banner::AccessDenied => {
                "Permissão negada pelo banco de dados. Verifique as regras de acesso."
            }
            Banner::Unknown => "Erro inesperado ao sincronizar os pedidos.",
        }
    }
}

impl From<StoreErrorKind> for Banner {
    fn from(kind: StoreErrorKind) -> Self {
        match kind {
            StoreErrorKind::Connectivity => Banner::Connectivity,
            StoreErrorKind::PermissionDenied => Banner::AccessDenied,
            StoreErrorKind::Unknown => Banner::Unknown,
        }
    }
}

/// A [`ClientView`] shared with a live subscription.
pub type SharedView = Arc<Mutex<ClientView>>;

/// Read-only projection held by one patron or admin instance.
///
/// The last good snapshot stays visible while a banner reports a sync failure.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    snapshot: Option<Arc<QueueSnapshot>>,
    banner: Option<Banner>,
    identity: Option<Identity>,
}

impl ClientView {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn shared(identity: Option<Identity>) -> SharedView {
        Arc::new(Mutex::new(Self::new(identity)))
    }

    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub fn apply(&mut self, update: &SyncUpdate) {
        match update {
            SyncUpdate::Waiting => {}
            SyncUpdate::Snapshot(snapshot) => self.apply_snapshot(snapshot.clone()),
            SyncUpdate::Failed(failure) => self.apply_failure(failure),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: Arc<QueueSnapshot>) {
        self.snapshot = Some(snapshot);
        self.banner = None;
    }

    pub fn apply_failure(&mut self, failure: &SyncFailure) {
        self.banner = Some(failure.kind.into());
    }

    /// No snapshot has arrived yet.
    pub fn is_loading(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn banner(&self) -> Option<Banner> {
        self.banner
    }

    /// Gate value from the latest snapshot, if any.
    pub fn session_open(&self) -> Option<bool> {
        self.snapshot.as_ref().map(|snapshot| snapshot.is_open())
    }

    /// The patron's own requests, newest first. Empty without an identity.
    pub fn personal(&self) -> Vec<&SongRequest> {
        match (&self.snapshot, &self.identity) {
            (Some(snapshot), Some(identity)) => snapshot.patron_view(identity),
            _ => Vec::new(),
        }
    }

    /// Every request, oldest first.
    pub fn admin(&self) -> Vec<&SongRequest> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.admin_view())
            .unwrap_or_default()
    }
}

/// Keep `view` current from `hub`, replacing whatever subscription `slot` held.
pub fn follow(view: &SharedView, hub: &SyncHub, slot: &mut SubscriptionSlot) {
    let on_update = view.clone();
    let on_error = view.clone();
    let subscription = hub.subscribe(
        move |snapshot| match on_update.lock() {
            Ok(mut view) => view.apply_snapshot(snapshot),
            Err(_) => warn!("client view lock poisoned; dropping snapshot"),
        },
        move |failure| match on_error.lock() {
            Ok(mut view) => view.apply_failure(&failure),
            Err(_) => warn!("client view lock poisoned; dropping sync failure"),
        },
    );
    slot.replace(subscription);
}
