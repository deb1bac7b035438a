use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::{
        catalog::SuggestionView, diagnostics::ConnectionTestResponse, session::SessionResponse,
    },
    error::AppError,
    services::{catalog_service, diagnostics_service, public_service},
    state::SharedState,
};

/// Public read-only endpoints plus the connection self-test.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/songs/suggestions", get(get_suggestions))
        .route("/diagnostics/connection", post(test_connection))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "public",
    responses(
        (status = 200, description = "Whether new requests are admitted", body = SessionResponse),
        (status = 503, description = "Storage unreachable", body = crate::error::ErrorBody)
    )
)]
/// Return the session gate as patrons should see it.
pub async fn get_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(public_service::session_status(&state).await?))
}

#[utoipa::path(
    get,
    path = "/songs/suggestions",
    tag = "public",
    responses((status = 200, description = "Popular songs offered on the request form", body = [SuggestionView]))
)]
pub async fn get_suggestions(State(state): State<SharedState>) -> Json<Vec<SuggestionView>> {
    Json(catalog_service::suggestions(&state))
}

#[utoipa::path(
    post,
    path = "/diagnostics/connection",
    tag = "public",
    responses((status = 200, description = "Outcome of a write-then-delete probe against storage", body = ConnectionTestResponse))
)]
/// Probe read/write access to storage and explain any failure.
pub async fn test_connection(State(state): State<SharedState>) -> Json<ConnectionTestResponse> {
    Json(diagnostics_service::test_connection(&state).await)
}
