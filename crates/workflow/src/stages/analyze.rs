//! AnalyzeQuestion: plan the approach. Never fails the workflow.

use crate::assessment::{parse_analysis, AssessmentSource, QuestionAnalysis};
use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep};
use askflow_core::AppResult;
use askflow_prompt::build_prompt;
use serde_json::json;
use std::collections::HashMap;

pub async fn analyze_question(
    mut state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Analyzing question");

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), ctx.question.text.clone());

    let outcome = match build_prompt(&ctx.prompts.analyze, &variables) {
        Ok(prompt) => ctx.complete("question analysis", &prompt, None).await,
        Err(e) => Err(e),
    };

    let (analysis, source, error) = match outcome {
        Ok(text) => {
            let (analysis, source) = parse_analysis(&text);
            (analysis, source, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Question analysis failed, using defaults");
            (
                QuestionAnalysis::default(),
                AssessmentSource::Defaulted,
                Some(e.to_string()),
            )
        }
    };

    let mut payload = json!({
        "analysis": analysis,
        "source": source,
    });
    if let Some(error) = error {
        payload["error"] = json!(error);
    }

    tracing::debug!(complexity = analysis.complexity, kind = %analysis.question_type, "Question analyzed");

    state.analysis = Some(analysis);
    state.record_step(ReasoningStep::new(
        Node::AnalyzeQuestion,
        "Analyzed question complexity and requirements",
        payload,
    ));

    Ok(state)
}
