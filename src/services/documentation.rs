use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Karaoke Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_session,
        crate::routes::public::get_suggestions,
        crate::routes::public::test_connection,
        crate::routes::requests::submit_request,
        crate::routes::requests::my_requests,
        crate::routes::requests::delete_own_request,
        crate::routes::sse::queue_stream,
        crate::routes::admin::login,
        crate::routes::admin::logout,
        crate::routes::admin::list_requests,
        crate::routes::admin::advance_request,
        crate::routes::admin::delete_request,
        crate::routes::admin::open_session,
        crate::routes::admin::close_session,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::session::SessionResponse,
            crate::dto::catalog::SuggestionView,
            crate::dto::diagnostics::ConnectionStatus,
            crate::dto::diagnostics::ConnectionTestResponse,
            crate::dto::common::SongRequestView,
            crate::dto::common::QueueSnapshotDto,
            crate::dto::request::SubmitRequestPayload,
            crate::dto::request::SubmitResponse,
            crate::dto::request::HandoffView,
            crate::dto::request::DeleteOwnRequest,
            crate::dto::request::MyRequestsResponse,
            crate::dto::admin::LoginRequest,
            crate::dto::admin::LoginResponse,
            crate::dto::admin::AdvanceResponse,
            crate::dto::admin::CloseSessionRequest,
            crate::dto::admin::CloseSessionResponse,
            crate::dto::admin::AdminQueueResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SyncErrorEvent,
            crate::dao::storage::StoreErrorKind,
            crate::state::queue::RequestStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Session gate, suggestions and diagnostics"),
        (name = "requests", description = "Patron song requests"),
        (name = "admin", description = "Staff queue management"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_queue_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/requests",
            "/requests/{id}",
            "/admin/requests/{id}/advance",
            "/admin/session/close",
            "/sse/queue",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
