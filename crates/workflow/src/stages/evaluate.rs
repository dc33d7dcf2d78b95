//! EvaluateAnswerQuality: model self-assessment of the latest answer.
//!
//! Unreadable output and failed calls both fall back to the default
//! assessment; nothing here fails the workflow.

use crate::assessment::{parse_self_assessment, AssessmentSource, SelfAssessment};
use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep};
use askflow_core::AppResult;
use askflow_prompt::build_prompt;
use serde_json::json;
use std::collections::HashMap;

pub async fn evaluate_answer_quality(
    mut state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    let Some(answer) = state.latest_answer().map(str::to_string) else {
        tracing::warn!("No answer to evaluate");
        state.record_step(ReasoningStep::new(
            Node::EvaluateAnswerQuality,
            "Skipped answer evaluation: no answer generated",
            json!({ "skipped": true }),
        ));
        return Ok(state);
    };

    tracing::info!("Assessing answer quality");

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), ctx.question.text.clone());
    variables.insert("answer".to_string(), answer);

    let outcome = match build_prompt(&ctx.prompts.evaluate, &variables) {
        Ok(prompt) => ctx.complete("answer evaluation", &prompt, None).await,
        Err(e) => Err(e),
    };

    let (assessment, source, error) = match outcome {
        Ok(text) => {
            let (assessment, source) = parse_self_assessment(&text);
            (assessment, source, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Answer evaluation failed, using default confidence");
            (
                SelfAssessment::default(),
                AssessmentSource::Defaulted,
                Some(e.to_string()),
            )
        }
    };

    let confidence = state.set_confidence(assessment.overall);

    let mut payload = json!({
        "confidence": confidence,
        "needs_improvement": assessment.needs_improvement,
        "completeness": assessment.completeness,
        "accuracy": assessment.accuracy,
        "clarity": assessment.clarity,
        "source": source,
    });
    if let Some(error) = error {
        payload["error"] = json!(error);
    }

    state.record_step(ReasoningStep::new(
        Node::EvaluateAnswerQuality,
        format!("Evaluated answer quality: {:.2}", confidence),
        payload,
    ));

    Ok(state)
}
