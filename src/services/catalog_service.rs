use crate::{dto::catalog::SuggestionView, state::SharedState};

/// Song suggestions offered on the request form, in configured order.
pub fn suggestions(state: &SharedState) -> Vec<SuggestionView> {
    state
        .config()
        .suggestions()
        .iter()
        .map(SuggestionView::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::memory_state;

    #[tokio::test]
    async fn default_catalog_starts_with_evidencias() {
        let (state, _) = memory_state().await;
        let list = suggestions(&state);
        assert_eq!(list.len(), 9);
        assert_eq!(list[0].title, "Evidências");
        assert_eq!(list[0].artist, "Chitãozinho & Xororó");
    }
}
