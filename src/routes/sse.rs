use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/queue",
    tag = "sse",
    responses((status = 200, description = "Live queue: `queue.snapshot`, `sync.error` and `system.status` events", content_type = "text/event-stream", body = String))
)]
/// Stream every queue change to the connected patron or admin instance.
pub async fn queue_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    info!("New queue SSE connection");
    sse_service::queue_stream(&state)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/queue", get(queue_stream))
}
