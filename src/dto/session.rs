use serde::Serialize;
use utoipa::ToSchema;

/// Gate state as seen by patrons before they start a request.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub open: bool,
    /// True while no storage backend is connected.
    pub degraded: bool,
    /// Set when storage can never come up; clients should show the
    /// informational screen instead of the normal flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}
