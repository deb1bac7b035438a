//! Guard logic for the request lifecycle: input validation, admission through
//! the session gate, and who may remove which request.

use thiserror::Error;

use crate::{
    dao::request_store::DeleteGuard,
    state::queue::{Identity, RequestStatus, SessionState, Song, SongRequest},
};

/// Who is acting on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Unauthenticated patron identified by name and table.
    Patron(Identity),
    /// Operator who passed the shared access check.
    Admin,
}

impl Actor {
    /// Store-level guard enforcing the same rule as [`authorize_delete`].
    pub fn delete_guard(&self) -> DeleteGuard {
        match self {
            Actor::Admin => DeleteGuard::Any,
            Actor::Patron(identity) => DeleteGuard::OwnedPending {
                name: identity.name.clone(),
                table: identity.table.clone(),
            },
        }
    }
}

/// Rejections produced before any store mutation happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("`{field}` must not be blank")]
    Blank { field: &'static str },
    #[error("the karaoke session is closed")]
    SessionClosed,
    #[error("only the requester can remove this request")]
    NotOwner,
    #[error("request is already {status}; only staff can remove it now")]
    NotPending { status: RequestStatus },
}

/// Reject blank identity or song fields. Values themselves are never altered.
pub fn validate_submission(identity: &Identity, song: &Song) -> Result<(), LifecycleError> {
    let fields = [
        ("name", identity.name.as_str()),
        ("table", identity.table.as_str()),
        ("title", song.title.as_str()),
        ("artist", song.artist.as_str()),
    ];

    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(LifecycleError::Blank { field }),
        None => Ok(()),
    }
}

/// New requests are only admitted while the session gate is open.
pub fn admit_submission(session: &SessionState) -> Result<(), LifecycleError> {
    if session.open {
        Ok(())
    } else {
        Err(LifecycleError::SessionClosed)
    }
}

/// Admins may remove anything; patrons only their own request while still pending.
pub fn authorize_delete(actor: &Actor, request: &SongRequest) -> Result<(), LifecycleError> {
    match actor {
        Actor::Admin => Ok(()),
        Actor::Patron(identity) => {
            if !request.is_owned_by(identity) {
                return Err(LifecycleError::NotOwner);
            }
            if request.status != RequestStatus::Pending {
                return Err(LifecycleError::NotPending {
                    status: request.status,
                });
            }
            Ok(())
        }
    }
}

/// Treat a blank dedication as absent; anything else is kept verbatim.
pub fn normalize_dedication(dedication: Option<String>) -> Option<String> {
    dedication.filter(|text| !text.trim().is_empty())
}
