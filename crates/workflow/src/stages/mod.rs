//! Stage functions, one per graph node.
//!
//! Every stage takes the state by value and hands it back, so exactly one
//! owner exists at any time.

pub mod analyze;
pub mod evaluate;
pub mod generate;
pub mod retrieval;
pub mod sufficiency;
pub mod synthesize;

use crate::context::StageContext;
use crate::state::{EvaluationState, Node};
use askflow_core::AppResult;

/// Run the stage behind `node`.
pub async fn run_stage(
    node: Node,
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    match node {
        Node::AnalyzeQuestion => analyze::analyze_question(state, ctx).await,
        Node::LocalSearch => retrieval::local_search(state, ctx).await,
        Node::KnowledgeBaseSearch => retrieval::knowledge_base_search(state, ctx).await,
        Node::CodeRepositorySearch => retrieval::code_repository_search(state, ctx).await,
        Node::EvaluateLocalSufficiency => sufficiency::evaluate_local_sufficiency(state, ctx).await,
        Node::WebSearch => retrieval::web_search(state, ctx).await,
        Node::GenerateAnswer => generate::generate_answer(state, ctx).await,
        Node::EvaluateAnswerQuality => evaluate::evaluate_answer_quality(state, ctx).await,
        Node::SynthesizeFinal => synthesize::synthesize_final(state, ctx).await,
    }
}
