use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Suggestion;

/// One-tap song suggestion for the request form.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct SuggestionView {
    pub title: String,
    pub artist: String,
}

impl From<&Suggestion> for SuggestionView {
    fn from(value: &Suggestion) -> Self {
        Self {
            title: value.title.clone(),
            artist: value.artist.clone(),
        }
    }
}
