use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoRequestDocument, MongoSessionDocument, doc_id, session_filter, session_update,
    },
};
use crate::{
    dao::{
        models::{NewSongRequest, SessionEntity, SongRequestEntity},
        request_store::{DeleteGuard, DeleteOutcome, PurgeReport, RequestStore, StatusUpdate},
        storage::StorageResult,
    },
    state::queue::RequestStatus,
};

const REQUEST_COLLECTION_NAME: &str = "requests";
const SESSION_COLLECTION_NAME: &str = "session";
const PROBE_COLLECTION_NAME: &str = "connection_probe";

#[derive(Clone)]
pub struct MongoRequestStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRequestStore {
    /// Connect to MongoDB and make sure the queue ordering index exists.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"submitted_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("request_submitted_at_idx".to_owned()))
                    .build(),
            )
            .build();

        self.requests()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: REQUEST_COLLECTION_NAME,
                index: "submitted_at",
                source,
            })?;
        Ok(())
    }

    async fn client(&self) -> Client {
        self.inner.state.read().await.client.clone()
    }

    async fn requests(&self) -> Collection<MongoRequestDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRequestDocument>(REQUEST_COLLECTION_NAME)
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn create_request(&self, request: NewSongRequest) -> MongoResult<SongRequestEntity> {
        let entity = SongRequestEntity::create(Uuid::new_v4(), request);
        let id = entity.id;
        let document = MongoRequestDocument::from(entity.clone());
        self.requests()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::CreateRequest { id, source })?;
        Ok(entity)
    }

    async fn find_request(&self, id: Uuid) -> MongoResult<Option<SongRequestEntity>> {
        let document = self
            .requests()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRequest { id, source })?;
        document.map(SongRequestEntity::try_from).transpose()
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> MongoResult<StatusUpdate> {
        let mut filter = doc_id(id);
        filter.insert("status", expected.as_str());
        let result = self
            .requests()
            .await
            .update_one(filter, doc! {"$set": {"status": next.as_str()}})
            .await
            .map_err(|source| MongoDaoError::UpdateStatus { id, source })?;

        if result.matched_count > 0 {
            return Ok(StatusUpdate::Updated);
        }
        Ok(match self.find_request(id).await? {
            Some(current) => StatusUpdate::Conflict(current.status),
            None => StatusUpdate::Missing,
        })
    }

    async fn delete_request(&self, id: Uuid, guard: DeleteGuard) -> MongoResult<DeleteOutcome> {
        let filter = guarded_filter(id, &guard);
        let result = self
            .requests()
            .await
            .delete_one(filter)
            .await
            .map_err(|source| MongoDaoError::DeleteRequest { id, source })?;

        if result.deleted_count > 0 {
            return Ok(DeleteOutcome::Deleted);
        }
        Ok(match self.find_request(id).await? {
            Some(_) => DeleteOutcome::Rejected,
            None => DeleteOutcome::Missing,
        })
    }

    async fn list_requests(&self) -> MongoResult<Vec<SongRequestEntity>> {
        let documents: Vec<MongoRequestDocument> = self
            .requests()
            .await
            .find(doc! {})
            .sort(doc! {"submitted_at": -1, "_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListRequests { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRequests { source })?;

        documents
            .into_iter()
            .map(SongRequestEntity::try_from)
            .collect()
    }

    async fn session(&self) -> MongoResult<SessionEntity> {
        let document = self
            .sessions()
            .await
            .find_one(session_filter())
            .await
            .map_err(|source| MongoDaoError::Session { source })?;
        Ok(document.map(SessionEntity::from).unwrap_or_default())
    }

    async fn set_session_open(&self, open: bool) -> MongoResult<()> {
        self.sessions()
            .await
            .update_one(session_filter(), session_update(open))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Session { source })?;
        Ok(())
    }

    /// Gate flip and purge share one transaction; a replica set is required.
    async fn close_session(&self) -> MongoResult<PurgeReport> {
        let client = self.client().await;
        let sessions = self.sessions().await;
        let requests = self.requests().await;

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::CloseSession { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::CloseSession { source })?;

        sessions
            .update_one(session_filter(), session_update(false))
            .upsert(true)
            .session(&mut session)
            .await
            .map_err(|source| MongoDaoError::CloseSession { source })?;
        let purged = requests
            .delete_many(doc! {})
            .session(&mut session)
            .await
            .map_err(|source| MongoDaoError::CloseSession { source })?;

        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::CloseSession { source })?;

        debug!(deleted = purged.deleted_count, "mongo session closed");
        Ok(PurgeReport {
            deleted: usize::try_from(purged.deleted_count).unwrap_or(usize::MAX),
        })
    }

    async fn probe(&self) -> MongoResult<()> {
        let collection = {
            let guard = self.inner.state.read().await;
            guard.database.collection::<Document>(PROBE_COLLECTION_NAME)
        };
        let filter = doc! {"_id": Uuid::new_v4().to_string()};

        collection
            .insert_one(filter.clone())
            .await
            .map_err(|source| MongoDaoError::Probe { source })?;
        collection
            .delete_one(filter)
            .await
            .map_err(|source| MongoDaoError::Probe { source })?;
        Ok(())
    }
}

fn guarded_filter(id: Uuid, guard: &DeleteGuard) -> Document {
    let mut filter = doc_id(id);
    if let DeleteGuard::OwnedPending { name, table } = guard {
        filter.insert("name", name.as_str());
        filter.insert("table", table.as_str());
        filter.insert("status", RequestStatus::Pending.as_str());
    }
    filter
}

impl RequestStore for MongoRequestStore {
    fn create_request(
        &self,
        request: NewSongRequest,
    ) -> BoxFuture<'static, StorageResult<SongRequestEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_request(request).await.map_err(Into::into) })
    }

    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_request(id).await.map_err(Into::into) })
    }

    fn set_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> BoxFuture<'static, StorageResult<StatusUpdate>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_status(id, expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_request(
        &self,
        id: Uuid,
        guard: DeleteGuard,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.delete_request(id, guard).await.map_err(Into::into) })
    }

    fn list_requests(&self) -> BoxFuture<'static, StorageResult<Vec<SongRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_requests().await.map_err(Into::into) })
    }

    fn session(&self) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move { store.session().await.map_err(Into::into) })
    }

    fn set_session_open(&self, open: bool) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.set_session_open(open).await.map_err(Into::into) })
    }

    fn close_session(&self) -> BoxFuture<'static, StorageResult<PurgeReport>> {
        let store = self.clone();
        Box::pin(async move { store.close_session().await.map_err(Into::into) })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
