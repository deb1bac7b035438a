use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{SessionEntity, SongRequestEntity},
    state::queue::RequestStatus,
};

/// Identifier of the single session document.
pub const SESSION_DOC_ID: &str = "current";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSongDocument {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRequestDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub table: String,
    pub song: MongoSongDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedication: Option<String>,
    pub submitted_at: DateTime,
    pub status: RequestStatus,
}

impl From<SongRequestEntity> for MongoRequestDocument {
    fn from(value: SongRequestEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            table: value.table,
            song: MongoSongDocument {
                title: value.title,
                artist: value.artist,
            },
            dedication: value.dedication,
            submitted_at: DateTime::from_system_time(value.submitted_at),
            status: value.status,
        }
    }
}

impl TryFrom<MongoRequestDocument> for SongRequestEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRequestDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::MalformedId {
            id: value.id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            name: value.name,
            table: value.table,
            title: value.song.title,
            artist: value.song.artist,
            dedication: value.dedication,
            submitted_at: value.submitted_at.to_system_time(),
            status: value.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub open: bool,
    pub updated_at: DateTime,
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            open: value.open,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn session_filter() -> Document {
    doc! {"_id": SESSION_DOC_ID}
}

/// `$set` update writing the gate flag and its timestamp.
pub fn session_update(open: bool) -> Document {
    doc! {"$set": {"open": open, "updated_at": DateTime::now()}}
}
