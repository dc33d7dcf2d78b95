//! EvaluateLocalSufficiency: decide whether web search is needed.

use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep};
use askflow_core::AppResult;
use askflow_retrieval::RetrievedItem;
use serde_json::json;

/// Verdict over the local, knowledge-base and code results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sufficiency {
    NoResults,
    TooFew { count: usize },
    LowRelevance { count: usize, mean: f32 },
    Sufficient { count: usize, mean: f32 },
}

impl Sufficiency {
    pub fn needs_web_search(&self) -> bool {
        !matches!(self, Sufficiency::Sufficient { .. })
    }

    pub fn decision(&self) -> &'static str {
        match self {
            Sufficiency::NoResults => "No local, knowledge-base, or code resources found, will search web",
            Sufficiency::TooFew { .. } => "Limited information found, will search web",
            Sufficiency::LowRelevance { .. } => "Low relevance scores, will search web",
            Sufficiency::Sufficient { .. } => "Sufficient information from local sources",
        }
    }

    fn count(&self) -> usize {
        match self {
            Sufficiency::NoResults => 0,
            Sufficiency::TooFew { count }
            | Sufficiency::LowRelevance { count, .. }
            | Sufficiency::Sufficient { count, .. } => *count,
        }
    }

    fn mean(&self) -> Option<f32> {
        match self {
            Sufficiency::LowRelevance { mean, .. } | Sufficiency::Sufficient { mean, .. } => {
                Some(*mean)
            }
            _ => None,
        }
    }
}

/// Sufficient when at least `min_results` items exist and their mean
/// relevance reaches `min_relevance`.
pub fn assess_sufficiency<'a>(
    items: impl IntoIterator<Item = &'a RetrievedItem>,
    min_results: usize,
    min_relevance: f32,
) -> Sufficiency {
    let scores: Vec<f32> = items.into_iter().map(RetrievedItem::relevance).collect();
    let count = scores.len();

    if count == 0 {
        return Sufficiency::NoResults;
    }
    if count < min_results.max(1) {
        return Sufficiency::TooFew { count };
    }

    let mean = scores.iter().sum::<f32>() / count as f32;
    if mean >= min_relevance {
        Sufficiency::Sufficient { count, mean }
    } else {
        Sufficiency::LowRelevance { count, mean }
    }
}

pub async fn evaluate_local_sufficiency(
    mut state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    let verdict = assess_sufficiency(
        state.non_web_results(),
        ctx.workflow.sufficiency_min_results,
        ctx.workflow.sufficiency_min_relevance,
    );

    state.needs_more_info = verdict.needs_web_search();

    tracing::info!(
        total_results = verdict.count(),
        needs_web_search = state.needs_more_info,
        "{}",
        verdict.decision()
    );

    state.record_step(ReasoningStep::new(
        Node::EvaluateLocalSufficiency,
        verdict.decision(),
        json!({
            "total_results": verdict.count(),
            "mean_relevance": verdict.mean(),
            "needs_web_search": state.needs_more_info,
        }),
    ));

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(relevance: f32) -> RetrievedItem {
        RetrievedItem::DocumentChunk {
            title: "doc".to_string(),
            content: "text".to_string(),
            relevance,
            page: None,
        }
    }

    #[test]
    fn test_empty_is_insufficient() {
        let verdict = assess_sufficiency(&[], 3, 0.5);
        assert_eq!(verdict, Sufficiency::NoResults);
        assert!(verdict.needs_web_search());
    }

    #[test]
    fn test_too_few_items() {
        let items = [doc(0.99), doc(0.99)];
        assert_eq!(assess_sufficiency(&items, 3, 0.5), Sufficiency::TooFew { count: 2 });
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let items = [doc(0.5), doc(0.5), doc(0.5)];
        let verdict = assess_sufficiency(&items, 3, 0.5);
        assert!(!verdict.needs_web_search());
        assert_eq!(verdict.decision(), "Sufficient information from local sources");
    }

    #[test]
    fn test_low_relevance() {
        let items = [doc(0.2), doc(0.3), doc(0.4), doc(0.9)];
        let verdict = assess_sufficiency(&items, 3, 0.5);
        assert!(matches!(verdict, Sufficiency::LowRelevance { count: 4, .. }));
        assert!(verdict.needs_web_search());
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        // 3.0 reads as 1.0, so the mean is (1.0 + 0 + 0) / 3
        let items = [doc(3.0), doc(0.0), doc(0.0)];
        assert!(assess_sufficiency(&items, 3, 0.5).needs_web_search());
    }
}
