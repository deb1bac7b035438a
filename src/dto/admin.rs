//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{common::SongRequestView, validation::validate_not_blank},
    state::queue::RequestStatus,
};

/// Shared access code typed on the admin login screen.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub pin: String,
}

/// Opaque token to send back in the `x-admin-token` header.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

/// Optional precondition on the status being advanced.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdvanceQuery {
    /// Only advance if the request currently has this status.
    #[serde(default)]
    pub expected: Option<RequestStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceResponse {
    pub id: Uuid,
    pub previous: RequestStatus,
    pub status: RequestStatus,
}

/// Closing purges the queue, so the operator must confirm explicitly.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CloseSessionRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CloseSessionResponse {
    pub open: bool,
    /// Number of requests removed by the purge.
    pub purged: usize,
}

/// Full queue for the staff dashboard, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminQueueResponse {
    pub open: bool,
    pub requests: Vec<SongRequestView>,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
