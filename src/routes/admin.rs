use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        admin::{
            ActionResponse, AdminQueueResponse, AdvanceQuery, AdvanceResponse,
            CloseSessionRequest, CloseSessionResponse, LoginRequest, LoginResponse,
        },
        common::request_views,
    },
    error::{AppError, ErrorBody},
    services::{admin_service, auth_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Staff endpoints. Login and logout are open; the rest require `X-Admin-Token`.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/admin/requests", get(list_requests))
        .route("/admin/requests/{id}", delete(delete_request))
        .route("/admin/requests/{id}/advance", post(advance_request))
        .route("/admin/session/open", post(open_session))
        .route("/admin/session/close", post(close_session))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .merge(protected)
}

#[utoipa::path(
    post,
    path = "/admin/login",
    tag = "admin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin token to send as `X-Admin-Token`", body = LoginResponse),
        (status = 401, description = "Wrong PIN or admin login disabled", body = ErrorBody)
    )
)]
/// Exchange the shared staff PIN for an admin token.
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;
    let token = auth_service::login(&state, &payload.pin)?;
    Ok(Json(LoginResponse { token }))
}

#[utoipa::path(
    post,
    path = "/admin/logout",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login")),
    responses((status = 200, description = "Token revoked", body = ActionResponse))
)]
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, AppError> {
    let token = admin_token(&headers)?;
    let message = if auth_service::logout(&state, token) {
        "logged out"
    } else {
        "token was not active"
    };
    Ok(Json(ActionResponse {
        message: message.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/requests",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login")),
    responses((status = 200, description = "Whole queue, oldest first", body = AdminQueueResponse))
)]
/// Return the full queue in the order it should be sung.
pub async fn list_requests(
    State(state): State<SharedState>,
) -> Result<Json<AdminQueueResponse>, AppError> {
    let snapshot = admin_service::queue(&state).await?;
    Ok(Json(AdminQueueResponse {
        open: snapshot.is_open(),
        requests: request_views(&snapshot.admin_view()),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/requests/{id}/advance",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login"),
        ("id" = Uuid, Path, description = "Identifier of the request to advance"),
        AdvanceQuery
    ),
    responses(
        (status = 200, description = "Status moved one step along the cycle", body = AdvanceResponse),
        (status = 404, description = "Unknown request", body = ErrorBody),
        (status = 409, description = "Status no longer matches `expected`", body = ErrorBody)
    )
)]
/// Move a request to its next status.
pub async fn advance_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AdvanceQuery>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let advanced = admin_service::advance(&state, id, query.expected).await?;
    Ok(Json(AdvanceResponse {
        id: advanced.id,
        previous: advanced.previous,
        status: advanced.status,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/requests/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login"),
        ("id" = Uuid, Path, description = "Identifier of the request to remove")
    ),
    responses((status = 204, description = "Request removed (or already gone)"))
)]
pub async fn delete_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    admin_service::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/admin/session/open",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login")),
    responses((status = 200, description = "New requests are admitted again", body = ActionResponse))
)]
pub async fn open_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::open_session(&state).await?;
    Ok(Json(ActionResponse {
        message: "session opened".into(),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/session/close",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by /admin/login")),
    request_body = CloseSessionRequest,
    responses(
        (status = 200, description = "Session closed and queue purged", body = CloseSessionResponse),
        (status = 400, description = "`confirm` was not true", body = ErrorBody),
        (status = 502, description = "Purge did not complete", body = ErrorBody)
    )
)]
/// Close the gate and delete every request. Requires `confirm: true`.
pub async fn close_session(
    State(state): State<SharedState>,
    Json(payload): Json<CloseSessionRequest>,
) -> Result<Json<CloseSessionResponse>, AppError> {
    let report = admin_service::close_session(&state, payload.confirm).await?;
    Ok(Json(CloseSessionResponse {
        open: false,
        purged: report.deleted,
    }))
}

fn admin_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing admin token header `X-Admin-Token`".into()))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = admin_token(req.headers())?;
    auth_service::verify(&state, provided)?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::request_store::{RequestStore, memory::MemoryRequestStore},
        services::handoff::LoggingOpener,
        state::{AppState, queue::RequestStatus},
    };
    use std::sync::Arc;

    async fn admin_state() -> (SharedState, MemoryRequestStore) {
        let store = MemoryRequestStore::new();
        let state = AppState::new(
            AppConfig::default().with_admin_pin("2468"),
            Arc::new(LoggingOpener),
        );
        state.install_request_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn login_then_logout_revokes_token() {
        let (state, _) = admin_state().await;
        let Json(LoginResponse { token }) = login(
            State(state.clone()),
            Json(LoginRequest { pin: "2468".into() }),
        )
        .await
        .unwrap();
        assert!(auth_service::verify(&state, &token).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_str(&token).unwrap());
        let Json(response) = logout(State(state.clone()), headers).await.unwrap();
        assert_eq!(response.message, "logged out");
        assert!(auth_service::verify(&state, &token).is_err());
    }

    #[tokio::test]
    async fn wrong_pin_is_unauthorized() {
        let (state, _) = admin_state().await;
        let err = login(State(state), Json(LoginRequest { pin: "0000".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = admin_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[tokio::test]
    async fn stale_expected_status_is_a_conflict() {
        let (state, store) = admin_state().await;
        let created = store
            .create_request(crate::dao::models::NewSongRequest {
                name: "Ana".into(),
                table: "5".into(),
                title: "Wonderwall".into(),
                artist: "Oasis".into(),
                dedication: None,
                submitted_at: std::time::SystemTime::now(),
            })
            .await
            .unwrap();

        let Json(advanced) = advance_request(
            State(state.clone()),
            Path(created.id),
            Query(AdvanceQuery {
                expected: Some(RequestStatus::Pending),
            }),
        )
        .await
        .unwrap();
        assert_eq!(advanced.status, RequestStatus::Playing);

        let err = advance_request(
            State(state),
            Path(created.id),
            Query(AdvanceQuery {
                expected: Some(RequestStatus::Pending),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn close_requires_confirmation() {
        let (state, _) = admin_state().await;
        let err = close_session(
            State(state.clone()),
            Json(CloseSessionRequest { confirm: false }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "bad_request");

        let Json(closed) = close_session(State(state), Json(CloseSessionRequest { confirm: true }))
            .await
            .unwrap();
        assert!(!closed.open);
        assert_eq!(closed.purged, 0);
    }
}
