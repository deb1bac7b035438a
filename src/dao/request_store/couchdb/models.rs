use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::CouchDaoError;
use crate::{
    dao::models::{SessionEntity, SongRequestEntity},
    state::queue::RequestStatus,
};

pub const REQUEST_PREFIX: &str = "request::";
pub const PROBE_PREFIX: &str = "probe::";
pub const SESSION_DOC_ID: &str = "session::current";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body returned by a successful document `PUT`.
#[derive(Debug, Deserialize)]
pub struct PutResponse {
    pub rev: String,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<BulkDeletion>,
}

/// Tombstone entry sent to `_bulk_docs`.
#[derive(Debug, Serialize)]
pub struct BulkDeletion {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

/// Per-document outcome of a `_bulk_docs` call.
#[derive(Debug, Deserialize)]
pub struct BulkDocResult {
    pub id: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRequestDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub request: RequestBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub name: String,
    pub table: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedication: Option<String>,
    pub submitted_at: SystemTime,
    pub status: RequestStatus,
}

impl From<(SongRequestEntity, Option<String>)> for CouchRequestDocument {
    fn from((entity, rev): (SongRequestEntity, Option<String>)) -> Self {
        Self {
            id: request_doc_id(entity.id),
            rev,
            request: RequestBody {
                name: entity.name,
                table: entity.table,
                title: entity.title,
                artist: entity.artist,
                dedication: entity.dedication,
                submitted_at: entity.submitted_at,
                status: entity.status,
            },
        }
    }
}

impl TryFrom<CouchRequestDocument> for SongRequestEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchRequestDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.request.name,
            table: doc.request.table,
            title: doc.request.title,
            artist: doc.request.artist,
            dedication: doc.request.dedication,
            submitted_at: doc.request.submitted_at,
            status: doc.request.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub open: bool,
    pub updated_at: SystemTime,
}

impl CouchSessionDocument {
    pub fn new(open: bool, rev: Option<String>) -> Self {
        Self {
            id: SESSION_DOC_ID.to_owned(),
            rev,
            open,
            updated_at: SystemTime::now(),
        }
    }
}

impl From<CouchSessionDocument> for SessionEntity {
    fn from(doc: CouchSessionDocument) -> Self {
        Self {
            open: doc.open,
            updated_at: doc.updated_at,
        }
    }
}

pub fn request_doc_id(id: Uuid) -> String {
    format!("{}{}", REQUEST_PREFIX, id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::NewSongRequest;

    #[test]
    fn request_document_keeps_identity_and_status() {
        let entity = SongRequestEntity::create(
            Uuid::new_v4(),
            NewSongRequest {
                name: "Ana".into(),
                table: "5".into(),
                title: "Evidências".into(),
                artist: "Chitãozinho & Xororó".into(),
                dedication: Some("para a mesa 3".into()),
                submitted_at: SystemTime::UNIX_EPOCH,
            },
        );
        let doc = CouchRequestDocument::from((entity.clone(), None));
        assert!(doc.id.starts_with(REQUEST_PREFIX));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("_rev").is_none());

        let back = SongRequestEntity::try_from(doc).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(matches!(
            extract_uuid("request-no-separator"),
            Err(CouchDaoError::InvalidDocId { kind: "missing separator", .. })
        ));
        assert!(matches!(
            extract_uuid("request::not-a-uuid"),
            Err(CouchDaoError::InvalidDocId { kind: "invalid UUID", .. })
        ));
    }
}
