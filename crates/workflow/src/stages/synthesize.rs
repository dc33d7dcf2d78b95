//! SynthesizeFinal: pick the final answer and project sources.

use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep, Source, NO_ANSWER_PLACEHOLDER};
use askflow_core::AppResult;
use serde_json::json;

/// Sources in fixed group order: local, knowledge base, code, web.
pub fn collect_sources(state: &EvaluationState) -> Vec<Source> {
    state
        .local_results
        .iter()
        .chain(&state.knowledge_base_results)
        .chain(&state.code_results)
        .chain(&state.web_results)
        .map(Source::from)
        .collect()
}

pub async fn synthesize_final(
    mut state: EvaluationState,
    _ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Synthesizing final response");

    state.final_answer = Some(
        state
            .latest_answer()
            .unwrap_or(NO_ANSWER_PLACEHOLDER)
            .to_string(),
    );
    state.sources = collect_sources(&state);

    let total = state.sources.len();
    state.record_step(ReasoningStep::new(
        Node::SynthesizeFinal,
        "Compiled final answer and sources",
        json!({ "total_sources": total }),
    ));

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SourceType;
    use askflow_retrieval::RetrievedItem;

    fn web(title: &str) -> RetrievedItem {
        RetrievedItem::WebResult {
            title: title.to_string(),
            content: String::new(),
            relevance: 0.5,
            url: None,
        }
    }

    fn doc(title: &str) -> RetrievedItem {
        RetrievedItem::DocumentChunk {
            title: title.to_string(),
            content: String::new(),
            relevance: 0.5,
            page: None,
        }
    }

    #[test]
    fn test_group_order_and_within_group_order() {
        let mut state = EvaluationState::new();
        state.web_results = vec![web("w1"), web("w2")];
        state.local_results = vec![doc("d1"), doc("d2")];

        let sources = collect_sources(&state);
        let titles: Vec<&str> = sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["d1", "d2", "w1", "w2"]);
        assert_eq!(sources[0].source_type, SourceType::Document);
        assert_eq!(sources[3].source_type, SourceType::Web);
    }
}
