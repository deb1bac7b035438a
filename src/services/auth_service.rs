//! Shared-PIN admin login issuing opaque bearer tokens.

use std::time::{Duration, SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::ServiceError, state::SharedState};

/// Lifetime of an admin token; long enough to cover one night at the venue.
pub const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Exchange the shared PIN for a fresh admin token.
pub fn login(state: &SharedState, pin: &str) -> Result<String, ServiceError> {
    let Some(expected) = state.config().admin_pin() else {
        warn!("admin login attempted but no PIN is configured");
        return Err(ServiceError::Unauthorized("admin login is disabled".into()));
    };
    if !pins_match(expected, pin) {
        warn!("admin login rejected: wrong PIN");
        return Err(ServiceError::Unauthorized("invalid PIN".into()));
    }

    let now = SystemTime::now();
    state
        .admin_tokens()
        .retain(|_, issued_at| !expired(*issued_at, now));
    let token = Uuid::new_v4().simple().to_string();
    state.admin_tokens().insert(token.clone(), now);
    info!(active = state.admin_tokens().len(), "admin logged in");
    Ok(token)
}

/// Check that `token` was issued by [`login`], has not expired and was not
/// revoked since. Expired tokens are dropped on sight.
pub fn verify(state: &SharedState, token: &str) -> Result<(), ServiceError> {
    let now = SystemTime::now();
    let issued_at = state.admin_tokens().get(token).map(|entry| *entry.value());
    match issued_at {
        Some(issued_at) if !expired(issued_at, now) => Ok(()),
        Some(_) => {
            state.admin_tokens().remove(token);
            info!("admin token expired");
            Err(ServiceError::Unauthorized("admin token expired".into()))
        }
        None => Err(ServiceError::Unauthorized("invalid admin token".into())),
    }
}

fn expired(issued_at: SystemTime, now: SystemTime) -> bool {
    now.duration_since(issued_at).unwrap_or_default() >= ADMIN_TOKEN_TTL
}

/// Revoke a token. Returns whether it was active.
pub fn logout(state: &SharedState, token: &str) -> bool {
    let revoked = state.admin_tokens().remove(token).is_some();
    if revoked {
        info!("admin logged out");
    }
    revoked
}

/// Comparison whose duration does not depend on where the inputs differ.
fn pins_match(expected: &str, given: &str) -> bool {
    let (expected, given) = (expected.as_bytes(), given.as_bytes());
    expected.len() == given.len()
        && expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, services::handoff::LoggingOpener, state::AppState};

    fn state_with_pin(pin: &str) -> SharedState {
        AppState::new(
            AppConfig::default().with_admin_pin(pin),
            Arc::new(LoggingOpener),
        )
    }

    #[test]
    fn right_pin_issues_a_verifiable_token() {
        let state = state_with_pin("2468");
        let token = login(&state, "2468").unwrap();
        assert!(verify(&state, &token).is_ok());
        assert!(logout(&state, &token));
        assert!(verify(&state, &token).is_err());
        assert!(!logout(&state, &token));
    }

    #[test]
    fn wrong_pin_is_rejected() {
        let state = state_with_pin("2468");
        assert!(matches!(
            login(&state, "2469"),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(login(&state, "246").is_err());
        assert!(state.admin_tokens().is_empty());
    }

    #[test]
    fn expired_tokens_are_rejected_and_pruned() {
        let state = state_with_pin("2468");
        let issued = SystemTime::now() - ADMIN_TOKEN_TTL - Duration::from_secs(1);
        state.admin_tokens().insert("stale".into(), issued);
        state.admin_tokens().insert("forgotten".into(), issued);

        assert!(matches!(
            verify(&state, "stale"),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(!state.admin_tokens().contains_key("stale"));

        let fresh = login(&state, "2468").unwrap();
        assert!(!state.admin_tokens().contains_key("forgotten"));
        assert_eq!(state.admin_tokens().len(), 1);
        assert!(verify(&state, &fresh).is_ok());
    }

    #[test]
    fn login_is_disabled_without_a_pin() {
        let state = AppState::new(AppConfig::default(), Arc::new(LoggingOpener));
        assert!(login(&state, "").is_err());
        assert!(login(&state, "0000").is_err());
    }
}
