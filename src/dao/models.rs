use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::queue::{Identity, RequestStatus, SessionState, Song, SongRequest};

/// Request payload handed to the store; the store assigns the identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSongRequest {
    /// Requester name, snapshotted at submission time.
    pub name: String,
    /// Requester table label, snapshotted at submission time.
    pub table: String,
    /// Requested song title.
    pub title: String,
    /// Requested song artist.
    pub artist: String,
    /// Optional free-text dedication.
    pub dedication: Option<String>,
    /// Submission timestamp, never changed afterwards.
    pub submitted_at: SystemTime,
}

/// Song request as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongRequestEntity {
    /// Primary key assigned on creation.
    pub id: Uuid,
    /// Requester name.
    pub name: String,
    /// Requester table label.
    pub table: String,
    /// Requested song title.
    pub title: String,
    /// Requested song artist.
    pub artist: String,
    /// Optional free-text dedication.
    pub dedication: Option<String>,
    /// Submission timestamp.
    pub submitted_at: SystemTime,
    /// Current lifecycle status.
    pub status: RequestStatus,
}

impl SongRequestEntity {
    /// Materialise a freshly created pending request.
    pub fn create(id: Uuid, request: NewSongRequest) -> Self {
        Self {
            id,
            name: request.name,
            table: request.table,
            title: request.title,
            artist: request.artist,
            dedication: request.dedication,
            submitted_at: request.submitted_at,
            status: RequestStatus::Pending,
        }
    }
}

/// Single-record session gate as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Whether new requests are admitted.
    pub open: bool,
    /// Last time the flag was written.
    pub updated_at: SystemTime,
}

impl Default for SessionEntity {
    fn default() -> Self {
        Self {
            open: SessionState::default().open,
            updated_at: SystemTime::UNIX_EPOCH,
        }
    }
}

impl From<SongRequestEntity> for SongRequest {
    fn from(entity: SongRequestEntity) -> Self {
        Self {
            id: entity.id,
            requester: Identity::new(entity.name, entity.table),
            song: Song::new(entity.title, entity.artist),
            dedication: entity.dedication,
            submitted_at: entity.submitted_at,
            status: entity.status,
        }
    }
}

impl From<SongRequest> for SongRequestEntity {
    fn from(request: SongRequest) -> Self {
        Self {
            id: request.id,
            name: request.requester.name,
            table: request.requester.table,
            title: request.song.title,
            artist: request.song.artist,
            dedication: request.dedication,
            submitted_at: request.submitted_at,
            status: request.status,
        }
    }
}

impl From<SessionEntity> for SessionState {
    fn from(entity: SessionEntity) -> Self {
        Self { open: entity.open }
    }
}
