//! DTOs for the patron-facing request endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{common::SongRequestView, validation::validate_not_blank},
    services::handoff::HandoffReport,
    state::queue::{Identity, Song},
};

/// Payload submitted from the request form.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitRequestPayload {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub table: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub artist: String,
    #[serde(default)]
    pub dedication: Option<String>,
}

impl SubmitRequestPayload {
    pub fn into_parts(self) -> (Identity, Song, Option<String>) {
        (
            Identity::new(self.name, self.table),
            Song::new(self.title, self.artist),
            self.dedication,
        )
    }
}

/// Outcome of the staff hand-off that follows a stored submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct HandoffView {
    /// Deep link the client may open to notify staff.
    pub url: String,
    /// Plain-text message embedded in the link.
    pub message: String,
    /// Whether the server-side opener delivered it.
    pub delivered: bool,
}

impl From<HandoffReport> for HandoffView {
    fn from(report: HandoffReport) -> Self {
        Self {
            url: report.url,
            message: report.message,
            delivered: report.delivered,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub request: SongRequestView,
    pub handoff: HandoffView,
}

/// Patron identity passed as query parameters.
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct IdentityQuery {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub table: String,
}

impl From<IdentityQuery> for Identity {
    fn from(value: IdentityQuery) -> Self {
        Identity::new(value.name, value.table)
    }
}

/// Patron identity proving ownership of the request being withdrawn.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DeleteOwnRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub table: String,
}

impl From<DeleteOwnRequest> for Identity {
    fn from(value: DeleteOwnRequest) -> Self {
        Identity::new(value.name, value.table)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyRequestsResponse {
    /// Newest first.
    pub requests: Vec<SongRequestView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_payload_rejects_blank_song_fields() {
        let payload: SubmitRequestPayload = serde_json::from_str(
            r#"{"name":"Ana","table":"5","title":" ","artist":"Queen"}"#,
        )
        .unwrap();
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(payload.dedication.is_none());
    }

    #[test]
    fn submit_payload_keeps_values_verbatim() {
        let payload: SubmitRequestPayload = serde_json::from_str(
            r#"{"name":" Ana","table":"5 ","title":"Evidências","artist":"Chitãozinho & Xororó","dedication":"oi"}"#,
        )
        .unwrap();
        assert!(payload.validate().is_ok());
        let (identity, song, dedication) = payload.into_parts();
        assert_eq!(identity, Identity::new(" Ana", "5 "));
        assert_eq!(song.title, "Evidências");
        assert_eq!(dedication.as_deref(), Some("oi"));
    }

    #[test]
    fn identity_query_reports_every_blank_field() {
        let query = IdentityQuery {
            name: "".into(),
            table: " ".into(),
        };
        let errors = query.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("table"));

        let owner = DeleteOwnRequest {
            name: "Ana".into(),
            table: "5".into(),
        };
        assert!(owner.validate().is_ok());
    }
}
