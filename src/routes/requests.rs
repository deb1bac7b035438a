use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::{SongRequestView, request_views},
        request::{
            DeleteOwnRequest, IdentityQuery, MyRequestsResponse, SubmitRequestPayload,
            SubmitResponse,
        },
    },
    error::{AppError, ErrorBody},
    services::request_service,
    state::{SharedState, queue::Identity},
};

/// Patron endpoints: submit, list and withdraw song requests.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/requests", post(submit_request))
        .route("/requests/mine", get(my_requests))
        .route("/requests/{id}", delete(delete_own_request))
}

#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    request_body = SubmitRequestPayload,
    responses(
        (status = 201, description = "Request queued; hand-off link returned", body = SubmitResponse),
        (status = 400, description = "Blank identity or song field", body = ErrorBody),
        (status = 409, description = "The karaoke session is closed", body = ErrorBody)
    )
)]
/// Queue a song request and hand it off to staff.
pub async fn submit_request(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitRequestPayload>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    payload.validate()?;
    let (identity, song, dedication) = payload.into_parts();
    let submission = request_service::submit(&state, identity, song, dedication).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            request: SongRequestView::from(&submission.request),
            handoff: submission.handoff.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/requests/mine",
    tag = "requests",
    params(IdentityQuery),
    responses(
        (status = 200, description = "Requests made under this name and table, newest first", body = MyRequestsResponse),
        (status = 400, description = "Blank name or table", body = ErrorBody)
    )
)]
pub async fn my_requests(
    State(state): State<SharedState>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<MyRequestsResponse>, AppError> {
    query.validate()?;
    let identity = Identity::from(query);
    let requests = request_service::my_requests(&state, &identity).await?;
    let borrowed: Vec<_> = requests.iter().collect();

    Ok(Json(MyRequestsResponse {
        requests: request_views(&borrowed),
    }))
}

#[utoipa::path(
    delete,
    path = "/requests/{id}",
    tag = "requests",
    params(("id" = Uuid, Path, description = "Identifier of the request to withdraw")),
    request_body = DeleteOwnRequest,
    responses(
        (status = 204, description = "Request withdrawn (or already gone)"),
        (status = 403, description = "Not the requester, or the request is no longer pending", body = ErrorBody)
    )
)]
/// Withdraw one of the caller's own pending requests.
pub async fn delete_own_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeleteOwnRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    request_service::delete_own(&state, payload.into(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::request_store::RequestStore, services::admin_service,
        state::tests::memory_state,
    };

    fn payload(name: &str, title: &str) -> SubmitRequestPayload {
        SubmitRequestPayload {
            name: name.into(),
            table: "5".into(),
            title: title.into(),
            artist: "Chitãozinho & Xororó".into(),
            dedication: Some("para a mesa 3".into()),
        }
    }

    #[tokio::test]
    async fn submit_returns_created_request_and_link() {
        let (state, _) = memory_state().await;
        let (status, Json(body)) =
            submit_request(State(state.clone()), Json(payload("Ana", "Evidências")))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.request.title, "Evidências");
        assert!(body.handoff.url.starts_with("https://wa.me/"));
        assert!(!body.handoff.delivered);
    }

    #[tokio::test]
    async fn blank_title_is_a_bad_request() {
        let (state, store) = memory_state().await;
        let err = submit_request(State(state), Json(payload("Ana", "  ")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request");
        assert!(store.list_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_session_is_reported_as_such() {
        let (state, store) = memory_state().await;
        store.set_session_open(false).await.unwrap();

        let err = submit_request(State(state), Json(payload("Ana", "Evidências")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session_closed");
    }

    #[tokio::test]
    async fn my_requests_only_lists_exact_identity() {
        let (state, _) = memory_state().await;
        submit_request(State(state.clone()), Json(payload("Ana", "first")))
            .await
            .unwrap();
        submit_request(State(state.clone()), Json(payload("ana", "other")))
            .await
            .unwrap();

        let Json(body) = my_requests(
            State(state),
            Query(IdentityQuery {
                name: "Ana".into(),
                table: "5".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.requests.len(), 1);
        assert_eq!(body.requests[0].title, "first");
    }

    #[tokio::test]
    async fn withdrawing_a_playing_request_is_forbidden() {
        let (state, _) = memory_state().await;
        let (_, Json(created)) =
            submit_request(State(state.clone()), Json(payload("Ana", "Evidências")))
                .await
                .unwrap();
        admin_service::advance(&state, created.request.id, None)
            .await
            .unwrap();

        let err = delete_own_request(
            State(state),
            Path(created.request.id),
            Json(DeleteOwnRequest {
                name: "Ana".into(),
                table: "5".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }
}
