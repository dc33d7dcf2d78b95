//! Question-answering workflow for askflow.
//!
//! A question flows through a fixed graph of stages:
//! analysis, local/knowledge-base/code retrieval, a sufficiency check that
//! may escalate to web search, answer generation and self-evaluation, and
//! final synthesis. [`Orchestrator::execute`] is the only entry point and
//! always returns a [`QueryResult`].

pub mod assessment;
pub mod classify;
pub mod context;
pub mod graph;
pub mod orchestrator;
pub mod stages;
pub mod state;

#[cfg(test)]
mod tests;

pub use assessment::{AssessmentSource, QuestionAnalysis, SelfAssessment};
pub use classify::{CodeIntent, KnowledgeBaseIntent};
pub use context::{Collaborators, PromptSet};
pub use graph::{Condition, Edge, WorkflowGraph};
pub use orchestrator::Orchestrator;
pub use state::{
    EvaluationState, Node, QueryResult, Question, ReasoningStep, Source, SourceType, StepCategory,
};
