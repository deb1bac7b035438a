#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{NewSongRequest, SessionEntity, SongRequestEntity};
use crate::dao::storage::StorageResult;
use crate::state::queue::RequestStatus;

/// Outcome of a compare-and-set status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The new status was stored.
    Updated,
    /// No request with that id.
    Missing,
    /// The stored status was not the expected one; carries the actual value.
    Conflict(RequestStatus),
}

/// Condition attached to a single-document delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteGuard {
    /// Unconditional (admin).
    Any,
    /// Only when the requester matches exactly and the request is still pending.
    OwnedPending { name: String, table: String },
}

impl DeleteGuard {
    /// Evaluate the guard against a stored document.
    pub fn permits(&self, entity: &SongRequestEntity) -> bool {
        match self {
            DeleteGuard::Any => true,
            DeleteGuard::OwnedPending { name, table } => {
                entity.name == *name
                    && entity.table == *table
                    && entity.status == RequestStatus::Pending
            }
        }
    }
}

/// Outcome of a guarded delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The document was removed.
    Deleted,
    /// No request with that id.
    Missing,
    /// The document exists but the guard did not allow removing it.
    Rejected,
}

/// Result of closing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    /// Number of requests removed by the purge.
    pub deleted: usize,
}

/// Document-store boundary for the shared request queue and the session gate.
///
/// Every mutation is a single atomic document operation; `close_session` is the
/// only multi-document one and must never report success unless every delete applied.
pub trait RequestStore: Send + Sync {
    fn create_request(
        &self,
        request: NewSongRequest,
    ) -> BoxFuture<'static, StorageResult<SongRequestEntity>>;
    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongRequestEntity>>>;
    fn set_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> BoxFuture<'static, StorageResult<StatusUpdate>>;
    fn delete_request(
        &self,
        id: Uuid,
        guard: DeleteGuard,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>>;
    /// Ordered by submission time, newest first.
    fn list_requests(&self) -> BoxFuture<'static, StorageResult<Vec<SongRequestEntity>>>;
    fn session(&self) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    fn set_session_open(&self, open: bool) -> BoxFuture<'static, StorageResult<()>>;
    /// Flip the gate to closed and purge every request as one logical operation.
    fn close_session(&self) -> BoxFuture<'static, StorageResult<PurgeReport>>;
    /// Write then delete a throwaway document to verify read/write access.
    fn probe(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Sort helper shared by backends that cannot order on the server side.
pub(crate) fn sort_newest_first(requests: &mut [SongRequestEntity]) {
    requests.sort_by(|a, b| {
        b.submitted_at
            .cmp(&a.submitted_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
