//! The public entry point of the workflow.

use crate::context::{Collaborators, PromptSet, StageContext};
use crate::graph::{run_graph, WorkflowGraph};
use crate::state::{EvaluationState, QueryResult, Question};
use askflow_core::{AppResult, RetrievalSettings, WorkflowSettings};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Drives the workflow graph for one question at a time. Cheap to share:
/// it holds only settings and `Arc` handles.
pub struct Orchestrator {
    collaborators: Collaborators,
    workflow: WorkflowSettings,
    retrieval: RetrievalSettings,
    prompts: PromptSet,
    graph: WorkflowGraph,
}

impl Orchestrator {
    /// Create an orchestrator using the built-in prompts.
    pub fn new(
        collaborators: Collaborators,
        workflow: WorkflowSettings,
        retrieval: RetrievalSettings,
    ) -> AppResult<Self> {
        let prompts = PromptSet::builtin()?;
        let graph = WorkflowGraph::new(&workflow);
        Ok(Self {
            collaborators,
            workflow,
            retrieval,
            prompts,
            graph,
        })
    }

    /// Replace the prompt set (e.g. with workspace overrides).
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Answer `question`. Always returns a well-formed result: any error or
    /// panic inside the workflow becomes a degraded result with zero
    /// confidence.
    ///
    /// `max_iterations` is clamped into `1..=max_iterations_cap`.
    pub async fn execute(&self, question: Question) -> QueryResult {
        let bounded = self.workflow.bounded_iterations(question.max_iterations);
        let question = question.with_max_iterations(bounded);
        let detailed = question.detailed;

        tracing::info!(
            user = question.user_id.as_deref().unwrap_or("anonymous"),
            admin = question.is_admin,
            max_iterations = question.max_iterations,
            model = %question.model,
            "Executing workflow"
        );

        let ctx = StageContext {
            question: &question,
            collaborators: &self.collaborators,
            workflow: &self.workflow,
            retrieval: &self.retrieval,
            prompts: &self.prompts,
        };

        let run = AssertUnwindSafe(run_graph(&self.graph, EvaluationState::new(), &ctx))
            .catch_unwind()
            .await;

        match run {
            Ok(Ok(state)) => {
                let result = state.into_result(detailed);
                tracing::info!(
                    confidence = result.confidence_score,
                    sources = result.sources.len(),
                    iterations = result.iterations_used,
                    "Workflow complete"
                );
                result
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Workflow execution failed");
                QueryResult::degraded(&e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(panic = %reason, "Workflow panicked");
                QueryResult::degraded(&reason)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("internal failure: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("internal failure: {}", message)
    } else {
        "internal failure".to_string()
    }
}
