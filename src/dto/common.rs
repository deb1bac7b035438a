use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::queue::{QueueSnapshot, RequestStatus, SongRequest},
};

/// Song request as exposed over HTTP and SSE.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct SongRequestView {
    pub id: Uuid,
    pub name: String,
    pub table: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedication: Option<String>,
    /// RFC 3339 submission timestamp.
    pub submitted_at: String,
    pub status: RequestStatus,
}

impl From<&SongRequest> for SongRequestView {
    fn from(request: &SongRequest) -> Self {
        Self {
            id: request.id,
            name: request.requester.name.clone(),
            table: request.requester.table.clone(),
            title: request.song.title.clone(),
            artist: request.song.artist.clone(),
            dedication: request.dedication.clone(),
            submitted_at: format_system_time(request.submitted_at),
            status: request.status,
        }
    }
}

/// Complete queue snapshot: gate state plus every live request, newest first.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct QueueSnapshotDto {
    pub open: bool,
    pub requests: Vec<SongRequestView>,
}

impl From<&QueueSnapshot> for QueueSnapshotDto {
    fn from(snapshot: &QueueSnapshot) -> Self {
        Self {
            open: snapshot.is_open(),
            requests: snapshot.requests().iter().map(Into::into).collect(),
        }
    }
}

/// Convert a view of borrowed requests into DTOs, preserving its order.
pub fn request_views(requests: &[&SongRequest]) -> Vec<SongRequestView> {
    requests.iter().map(|request| (*request).into()).collect()
}
