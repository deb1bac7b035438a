use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{NewSongRequest, SessionEntity, SongRequestEntity},
        request_store::{
            DeleteGuard, DeleteOutcome, PurgeReport, RequestStore, StatusUpdate,
            sort_newest_first,
        },
        storage::{StorageError, StorageResult},
    },
    state::queue::RequestStatus,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDeletion, BulkDocResult, BulkDocsRequest, CouchRequestDocument,
        CouchSessionDocument, END_SUFFIX, PROBE_PREFIX, PutResponse, REQUEST_PREFIX,
        SESSION_DOC_ID, request_doc_id,
    },
};

/// Attempts made when a revision conflict races a read-modify-write.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Outcome of a revisioned write.
enum Write<T> {
    Applied(T),
    Conflict,
}

#[derive(Clone)]
pub struct CouchRequestStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRequestStore {
    /// Build the HTTP client and create the queue database if it is missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url);
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseQuery {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another instance created it first.
                if create.status().is_success()
                    || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// `PUT` a document; a stale `_rev` comes back as [`Write::Conflict`].
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<Write<String>>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(Write::Conflict),
            status if status.is_success() => {
                let body = response.json::<PutResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(Write::Applied(body.rev))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// `DELETE` a document revision. A vanished document counts as removed.
    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<Write<()>> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(Write::Conflict),
            StatusCode::NOT_FOUND => Ok(Write::Applied(())),
            status if status.is_success() => Ok(Write::Applied(())),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> CouchResult<StatusUpdate> {
        let doc_id = request_doc_id(id);
        for _ in 0..MAX_CONFLICT_RETRIES {
            let Some(mut doc) = self.get_document::<CouchRequestDocument>(&doc_id).await? else {
                return Ok(StatusUpdate::Missing);
            };
            if doc.request.status != expected {
                return Ok(StatusUpdate::Conflict(doc.request.status));
            }
            doc.request.status = next;
            if let Write::Applied(_) = self.put_document(&doc_id, &doc).await? {
                return Ok(StatusUpdate::Updated);
            }
            debug!(%id, "status update raced another writer, retrying");
        }
        Err(CouchDaoError::RevisionConflict {
            path: doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    async fn delete_request(&self, id: Uuid, guard: DeleteGuard) -> CouchResult<DeleteOutcome> {
        let doc_id = request_doc_id(id);
        for _ in 0..MAX_CONFLICT_RETRIES {
            let Some(doc) = self.get_document::<CouchRequestDocument>(&doc_id).await? else {
                return Ok(DeleteOutcome::Missing);
            };
            let rev = doc.rev.clone().unwrap_or_default();
            let entity = SongRequestEntity::try_from(doc)?;
            if !guard.permits(&entity) {
                return Ok(DeleteOutcome::Rejected);
            }
            if let Write::Applied(()) = self.delete_document(&doc_id, &rev).await? {
                return Ok(DeleteOutcome::Deleted);
            }
        }
        Err(CouchDaoError::RevisionConflict {
            path: doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    async fn list_requests(&self) -> CouchResult<Vec<SongRequestEntity>> {
        let documents = self
            .list_documents::<CouchRequestDocument>(REQUEST_PREFIX)
            .await?;
        let mut requests = documents
            .into_iter()
            .map(SongRequestEntity::try_from)
            .collect::<CouchResult<Vec<_>>>()?;
        sort_newest_first(&mut requests);
        Ok(requests)
    }

    async fn session(&self) -> CouchResult<SessionEntity> {
        Ok(self
            .get_document::<CouchSessionDocument>(SESSION_DOC_ID)
            .await?
            .map(SessionEntity::from)
            .unwrap_or_default())
    }

    async fn set_session_open(&self, open: bool) -> CouchResult<()> {
        for _ in 0..MAX_CONFLICT_RETRIES {
            let rev = self
                .get_document::<CouchSessionDocument>(SESSION_DOC_ID)
                .await?
                .and_then(|doc| doc.rev);
            let doc = CouchSessionDocument::new(open, rev);
            if let Write::Applied(_) = self.put_document(SESSION_DOC_ID, &doc).await? {
                return Ok(());
            }
        }
        Err(CouchDaoError::RevisionConflict {
            path: SESSION_DOC_ID.to_owned(),
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    /// Close the gate, then tombstone every request in one `_bulk_docs` call.
    ///
    /// CouchDB has no multi-document transaction: the gate is flipped first so no
    /// new request can land during the purge, and any per-document failure is
    /// surfaced as [`StorageError::BatchIncomplete`].
    async fn close_session(&self) -> StorageResult<PurgeReport> {
        const BULK_DOCS: &str = "_bulk_docs";

        self.set_session_open(false).await?;

        let docs: Vec<BulkDeletion> = self
            .list_documents::<CouchRequestDocument>(REQUEST_PREFIX)
            .await?
            .into_iter()
            .filter_map(|doc| {
                doc.rev.map(|rev| BulkDeletion {
                    id: doc.id,
                    rev,
                    deleted: true,
                })
            })
            .collect();
        let total = docs.len();
        if total == 0 {
            return Ok(PurgeReport { deleted: 0 });
        }

        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            }
            .into());
        }
        let results = response
            .json::<Vec<BulkDocResult>>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        purge_outcome(&results, total)
    }

    async fn probe(&self) -> CouchResult<()> {
        let doc_id = format!("{}{}", PROBE_PREFIX, Uuid::new_v4());
        let body = serde_json::json!({ "probe": true });
        match self.put_document(&doc_id, &body).await? {
            Write::Applied(rev) => {
                self.delete_document(&doc_id, &rev).await?;
                Ok(())
            }
            Write::Conflict => Err(CouchDaoError::RevisionConflict {
                path: doc_id,
                attempts: 1,
            }),
        }
    }

    async fn health_check(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

/// Turn the rows of a `_bulk_docs` purge into a report. Rows that are missing
/// or not `ok` count as failures, so a partial purge is never a success.
fn purge_outcome(results: &[BulkDocResult], total: usize) -> StorageResult<PurgeReport> {
    let mut applied = 0;
    for result in results {
        if result.ok {
            applied += 1;
        } else {
            warn!(
                doc_id = %result.id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "bulk delete left a request behind"
            );
        }
    }

    if applied < total {
        return Err(StorageError::BatchIncomplete {
            failed: total - applied,
            total,
        });
    }
    Ok(PurgeReport { deleted: total })
}

impl RequestStore for CouchRequestStore {
    fn create_request(
        &self,
        request: NewSongRequest,
    ) -> BoxFuture<'static, StorageResult<SongRequestEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let entity = SongRequestEntity::create(Uuid::new_v4(), request);
            let doc_id = request_doc_id(entity.id);
            let doc = CouchRequestDocument::from((entity.clone(), None));
            match store.put_document(&doc_id, &doc).await? {
                Write::Applied(_) => Ok(entity),
                Write::Conflict => Err(CouchDaoError::RevisionConflict {
                    path: doc_id,
                    attempts: 1,
                }
                .into()),
            }
        })
    }

    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchRequestDocument>(&request_doc_id(id))
                .await?;
            Ok(doc.map(SongRequestEntity::try_from).transpose()?)
        })
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
        Box::pin(async move { store.close_session().await })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.health_check().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
