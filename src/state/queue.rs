//! Core queue model: identities, song requests, their lifecycle status and the
//! snapshot projections shown to patrons and staff.

use std::{cmp::Ordering, fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identifier assigned by the request store when a request is created.
pub type RequestId = Uuid;

/// Self-declared patron identity. Not unique: two patrons may pick the same pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Display name typed by the patron.
    pub name: String,
    /// Table label typed by the patron.
    pub table: String,
}

impl Identity {
    /// Build an identity from raw values, kept exactly as typed.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
        }
    }

    /// Exact, case- and whitespace-sensitive comparison used for ownership.
    pub fn matches(&self, name: &str, table: &str) -> bool {
        self.name == name && self.table == table
    }
}

/// Song title and artist, both free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Song title as typed by the requester.
    pub title: String,
    /// Performing artist.
    pub artist: String,
}

impl Song {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Lifecycle status of a song request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting in the queue.
    #[default]
    Pending,
    /// Currently on stage.
    Playing,
    /// Already sung.
    Completed,
}

impl RequestStatus {
    /// Next status in the admin cycle: pending, playing, completed, then back to pending.
    pub fn advance(self) -> Self {
        match self {
            RequestStatus::Pending => RequestStatus::Playing,
            RequestStatus::Playing => RequestStatus::Completed,
            RequestStatus::Completed => RequestStatus::Pending,
        }
    }

    /// Stable wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Playing => "playing",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A song request as seen by every connected instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    /// Store-assigned identifier.
    pub id: RequestId,
    /// Identity snapshot taken at submission time.
    pub requester: Identity,
    /// Requested song.
    pub song: Song,
    /// Optional note read out on stage; never blank when present.
    pub dedication: Option<String>,
    /// Set once at creation; the queue sort key.
    pub submitted_at: SystemTime,
    /// Where the request is in the admin cycle.
    pub status: RequestStatus,
}

impl SongRequest {
    /// Whether `identity` owns this request under the exact-match rule.
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        identity.matches(&self.requester.name, &self.requester.table)
    }
}

/// Venue-wide admission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Whether new requests are admitted.
    pub open: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { open: true }
    }
}

/// Complete point-in-time copy of the queue and the session gate.
///
/// Requests are held newest first, matching the order the live query delivers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    session: SessionState,
    requests: Vec<SongRequest>,
}

impl QueueSnapshot {
    /// Build a snapshot, normalising the request order to newest first.
    pub fn new(session: SessionState, mut requests: Vec<SongRequest>) -> Self {
        requests.sort_by(newest_first);
        Self { session, requests }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.open
    }

    /// All requests, newest first.
    pub fn requests(&self) -> &[SongRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn find(&self, id: RequestId) -> Option<&SongRequest> {
        self.requests.iter().find(|request| request.id == id)
    }

    /// Staff view: the whole queue, oldest first.
    pub fn admin_view(&self) -> Vec<&SongRequest> {
        let mut view: Vec<&SongRequest> = self.requests.iter().collect();
        view.sort_by(|a, b| oldest_first(a, b));
        view
    }

    /// Patron view: only the requests owned by `identity`, newest first.
    pub fn patron_view(&self, identity: &Identity) -> Vec<&SongRequest> {
        self.requests
            .iter()
            .filter(|request| request.is_owned_by(identity))
            .collect()
    }
}

fn newest_first(a: &SongRequest, b: &SongRequest) -> Ordering {
    b.submitted_at
        .cmp(&a.submitted_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn oldest_first(a: &SongRequest, b: &SongRequest) -> Ordering {
    a.submitted_at
        .cmp(&b.submitted_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;

    pub(crate) fn request_at(secs: u64, name: &str, table: &str, title: &str) -> SongRequest {
        SongRequest {
            id: Uuid::new_v4(),
            requester: Identity::new(name, table),
            song: Song::new(title, "Artist"),
            dedication: None,
            submitted_at: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            status: RequestStatus::Pending,
        }
    }

    #[test]
    fn advance_cycles_through_every_status() {
        let mut status = RequestStatus::Pending;
        let mut seen = Vec::new();
        for _ in 0..7 {
            status = status.advance();
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                RequestStatus::Playing,
                RequestStatus::Completed,
                RequestStatus::Pending,
                RequestStatus::Playing,
                RequestStatus::Completed,
                RequestStatus::Pending,
                RequestStatus::Playing,
            ]
        );
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(RequestStatus::Playing.to_string(), "playing");
    }

    #[test]
    fn snapshot_orders_newest_first_and_admin_view_oldest_first() {
        let first = request_at(10, "Ana", "5", "first");
        let second = request_at(20, "Bia", "2", "second");
        let third = request_at(30, "Ana", "5", "third");
        let snapshot = QueueSnapshot::new(
            SessionState::default(),
            vec![second.clone(), first.clone(), third.clone()],
        );

        let titles: Vec<_> = snapshot
            .requests()
            .iter()
            .map(|r| r.song.title.as_str())
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);

        let admin: Vec<_> = snapshot
            .admin_view()
            .into_iter()
            .map(|r| r.song.title.as_str())
            .collect();
        assert_eq!(admin, vec!["first", "second", "third"]);
    }

    #[test]
    fn patron_view_uses_exact_identity_match() {
        let mine = request_at(10, "Ana", "5", "mine");
        let other_case = request_at(11, "ana", "5", "lowercase");
        let padded = request_at(12, "Ana ", "5", "padded");
        let other_table = request_at(13, "Ana", "05", "other table");
        let snapshot = QueueSnapshot::new(
            SessionState::default(),
            vec![mine.clone(), other_case, padded, other_table],
        );

        let view = snapshot.patron_view(&Identity::new("Ana", "5"));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, mine.id);
    }

    #[test]
    fn identical_identities_share_one_personal_view() {
        let a = request_at(10, "João", "5", "from the first João");
        let b = request_at(20, "João", "5", "from the second João");
        let snapshot = QueueSnapshot::new(SessionState::default(), vec![a, b]);

        let view = snapshot.patron_view(&Identity::new("João", "5"));
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].song.title, "from the second João");
    }

    #[test]
    fn default_session_is_open() {
        assert!(QueueSnapshot::default().is_open());
    }
}
