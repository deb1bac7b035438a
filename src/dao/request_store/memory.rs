//! In-process [`RequestStore`] used for local development and the test suite.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    dao::{
        models::{NewSongRequest, SessionEntity, SongRequestEntity},
        request_store::{
            DeleteGuard, DeleteOutcome, PurgeReport, RequestStore, StatusUpdate,
            sort_newest_first,
        },
        storage::{StorageError, StorageResult, StoreErrorKind},
    },
    state::queue::RequestStatus,
};

/// Failure injected through [`MemoryRequestStore::fail_writes`].
#[derive(Debug, Error)]
#[error("memory store rejected the write ({kind:?})")]
pub struct InjectedFailure {
    kind: StoreErrorKind,
}

#[derive(Default)]
struct MemoryState {
    requests: HashMap<Uuid, SongRequestEntity>,
    session: SessionEntity,
    failing_writes: Option<StoreErrorKind>,
    failing_reads: Option<StoreErrorKind>,
    purge_limit: Option<usize>,
}

impl MemoryState {
    fn check_write(&self) -> StorageResult<()> {
        injected(self.failing_writes)
    }

    fn check_read(&self) -> StorageResult<()> {
        injected(self.failing_reads)
    }
}

fn injected(kind: Option<StoreErrorKind>) -> StorageResult<()> {
    match kind {
        Some(kind) => Err(StorageError::classified(
            kind,
            "memory store failure".into(),
            InjectedFailure { kind },
        )),
        None => Ok(()),
    }
}

/// Whole-state-under-one-lock store; every operation, the purge included, is atomic.
#[derive(Clone, Default)]
pub struct MemoryRequestStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `kind` (or succeed again with `None`).
    pub async fn fail_writes(&self, kind: Option<StoreErrorKind>) {
        self.inner.lock().await.failing_writes = kind;
    }

    /// Let the next purges remove at most `limit` requests before reporting an
    /// incomplete batch, the way a non-transactional backend can fail mid-purge.
    pub async fn limit_purge(&self, limit: Option<usize>) {
        self.inner.lock().await.purge_limit = limit;
    }

    /// Make every subsequent read fail with `kind` (or succeed again with `None`).
    pub async fn fail_reads(&self, kind: Option<StoreErrorKind>) {
        self.inner.lock().await.failing_reads = kind;
    }
}

impl RequestStore for MemoryRequestStore {
    fn create_request(
        &self,
        request: NewSongRequest,
    ) -> BoxFuture<'static, StorageResult<SongRequestEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            state.check_write()?;
            let mut id = Uuid::new_v4();
            while state.requests.contains_key(&id) {
                id = Uuid::new_v4();
            }
            let entity = SongRequestEntity::create(id, request);
            state.requests.insert(id, entity.clone());
            Ok(entity)
        })
    }

    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongRequestEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            state.check_read()?;
            Ok(state.requests.get(&id).cloned())
        })
    }

    fn set_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> BoxFuture<'static, StorageResult<StatusUpdate>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            state.check_write()?;
            let Some(entity) = state.requests.get_mut(&id) else {
                return Ok(StatusUpdate::Missing);
            };
            if entity.status != expected {
                return Ok(StatusUpdate::Conflict(entity.status));
            }
            entity.status = next;
            Ok(StatusUpdate::Updated)
        })
    }

    fn delete_request(
        &self,
        id: Uuid,
        guard: DeleteGuard,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            state.check_write()?;
            let outcome = match state.requests.get(&id) {
                None => DeleteOutcome::Missing,
                Some(entity) if !guard.permits(entity) => DeleteOutcome::Rejected,
                Some(_) => {
                    state.requests.remove(&id);
                    DeleteOutcome::Deleted
                }
            };
            Ok(outcome)
        })
    }

    fn list_requests(&self) -> BoxFuture<'static, StorageResult<Vec<SongRequestEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            state.check_read()?;
            let mut requests: Vec<_> = state.requests.values().cloned().collect();
            sort_newest_first(&mut requests);
            Ok(requests)
        })
    }

    fn session(&self) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            state.check_read()?;
            Ok(state.session.clone())
        })
    }

    fn set_session_open(&self, open: bool) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            state.check_write()?;
            state.session = SessionEntity {
                open,
                updated_at: SystemTime::now(),
            };
            Ok(())
        })
    }

    fn close_session(&self) -> BoxFuture<'static, StorageResult<PurgeReport>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            state.check_write()?;
            state.session = SessionEntity {
                open: false,
                updated_at: SystemTime::now(),
            };
            let total = state.requests.len();
            match state.purge_limit {
                Some(limit) if limit < total => {
                    let doomed: Vec<Uuid> = state.requests.keys().take(limit).copied().collect();
                    for id in doomed {
                        state.requests.remove(&id);
                    }
                    Err(StorageError::BatchIncomplete {
                        failed: total - limit,
                        total,
                    })
                }
                _ => {
                    state.requests.clear();
                    Ok(PurgeReport { deleted: total })
                }
            }
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            state.check_write()?;
            state.check_read()
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.lock().await.check_read() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
