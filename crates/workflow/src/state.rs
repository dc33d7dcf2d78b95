//! Workflow data model: the question, the evaluation state threaded through
//! the stages, trace entries, and the result record.

use crate::assessment::QuestionAnalysis;
use askflow_retrieval::{CodeEntryKind, Locator, RetrievedItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer used when synthesis finds no intermediate answer.
pub const NO_ANSWER_PLACEHOLDER: &str = "I couldn't generate an answer.";

/// Immutable request input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,

    /// Requester identity, when known
    pub user_id: Option<String>,

    pub is_admin: bool,

    /// Upper bound on GenerateAnswer invocations
    pub max_iterations: u32,

    /// Keep the reasoning trace in the result
    pub detailed: bool,

    /// Preferred model identifier
    pub model: String,
}

impl Question {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: None,
            is_admin: false,
            max_iterations: 3,
            detailed: true,
            model: model.into(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }
}

/// Workflow graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    AnalyzeQuestion,
    LocalSearch,
    KnowledgeBaseSearch,
    CodeRepositorySearch,
    EvaluateLocalSufficiency,
    WebSearch,
    GenerateAnswer,
    EvaluateAnswerQuality,
    SynthesizeFinal,
}

impl Node {
    pub const ALL: [Node; 9] = [
        Node::AnalyzeQuestion,
        Node::LocalSearch,
        Node::KnowledgeBaseSearch,
        Node::CodeRepositorySearch,
        Node::EvaluateLocalSufficiency,
        Node::WebSearch,
        Node::GenerateAnswer,
        Node::EvaluateAnswerQuality,
        Node::SynthesizeFinal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::AnalyzeQuestion => "analyze_question",
            Node::LocalSearch => "local_search",
            Node::KnowledgeBaseSearch => "knowledge_base_search",
            Node::CodeRepositorySearch => "code_repository_search",
            Node::EvaluateLocalSufficiency => "evaluate_local_sufficiency",
            Node::WebSearch => "web_search",
            Node::GenerateAnswer => "generate_answer",
            Node::EvaluateAnswerQuality => "evaluate_answer_quality",
            Node::SynthesizeFinal => "synthesize_final",
        }
    }

    pub fn category(&self) -> StepCategory {
        match self {
            Node::AnalyzeQuestion => StepCategory::Planning,
            Node::LocalSearch
            | Node::KnowledgeBaseSearch
            | Node::CodeRepositorySearch
            | Node::WebSearch => StepCategory::Retrieval,
            Node::EvaluateLocalSufficiency | Node::EvaluateAnswerQuality => {
                StepCategory::Evaluation
            }
            Node::GenerateAnswer => StepCategory::Generation,
            Node::SynthesizeFinal => StepCategory::Synthesis,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    Planning,
    Retrieval,
    Evaluation,
    Generation,
    Synthesis,
}

/// One append-only trace entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub node: Node,
    pub category: StepCategory,
    pub action: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    pub fn new(node: Node, action: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            node,
            category: node.category(),
            action: action.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Source family tag in the output projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Document,
    KnowledgeBase,
    CodeRepository,
    Web,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Document => "document",
            SourceType::KnowledgeBase => "knowledge_base",
            SourceType::CodeRepository => "code_repository",
            SourceType::Web => "web",
        }
    }
}

/// Flattened, display-oriented view of a [`RetrievedItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    pub relevance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_kind: Option<CodeEntryKind>,
}

impl From<&RetrievedItem> for Source {
    fn from(item: &RetrievedItem) -> Self {
        let source_type = match item {
            RetrievedItem::DocumentChunk { .. } => SourceType::Document,
            RetrievedItem::KnowledgeBaseEntry { .. } => SourceType::KnowledgeBase,
            RetrievedItem::CodeRepositoryEntry { .. } => SourceType::CodeRepository,
            RetrievedItem::WebResult { .. } => SourceType::Web,
        };

        Self {
            source_type,
            title: item.title().to_string(),
            locator: item.locator(),
            relevance: item.relevance(),
            code_kind: item.code_kind(),
        }
    }
}

/// The aggregate threaded through the workflow, owned by one request.
///
/// The trace, iteration counter, intermediate answers and confidence are
/// only reachable through methods that keep them consistent: the trace only
/// grows, the counter moves with each recorded answer, and confidence stays
/// in [0, 1].
#[derive(Debug, Clone, Default)]
pub struct EvaluationState {
    pub analysis: Option<QuestionAnalysis>,
    pub local_results: Vec<RetrievedItem>,
    pub knowledge_base_results: Vec<RetrievedItem>,
    pub code_results: Vec<RetrievedItem>,
    pub web_results: Vec<RetrievedItem>,
    pub needs_more_info: bool,
    pub final_answer: Option<String>,
    pub sources: Vec<Source>,

    iteration: u32,
    intermediate_answers: Vec<String>,
    reasoning_steps: Vec<ReasoningStep>,
    confidence: Option<f32>,
}

impl EvaluationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn intermediate_answers(&self) -> &[String] {
        &self.intermediate_answers
    }

    pub fn latest_answer(&self) -> Option<&str> {
        self.intermediate_answers.last().map(String::as_str)
    }

    pub fn reasoning_steps(&self) -> &[ReasoningStep] {
        &self.reasoning_steps
    }

    /// `None` until the answer has been evaluated.
    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn record_step(&mut self, step: ReasoningStep) {
        tracing::debug!(node = %step.node, action = %step.action, "Recorded reasoning step");
        self.reasoning_steps.push(step);
    }

    /// Store a generated answer; counts one GenerateAnswer invocation.
    pub fn record_answer(&mut self, answer: String) -> u32 {
        self.intermediate_answers.push(answer);
        self.iteration += 1;
        self.iteration
    }

    /// Set confidence, clamped to [0, 1] with NaN read as 0. Returns the
    /// stored value.
    pub fn set_confidence(&mut self, confidence: f32) -> f32 {
        let bounded = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self.confidence = Some(bounded);
        bounded
    }

    /// Items that count toward local sufficiency (everything but web).
    pub fn non_web_results(&self) -> impl Iterator<Item = &RetrievedItem> {
        self.local_results
            .iter()
            .chain(self.knowledge_base_results.iter())
            .chain(self.code_results.iter())
    }

    /// Extract the result record, dropping the trace unless `detailed`.
    pub fn into_result(self, detailed: bool) -> QueryResult {
        QueryResult {
            final_answer: self
                .final_answer
                .unwrap_or_else(|| NO_ANSWER_PLACEHOLDER.to_string()),
            confidence_score: self.confidence.unwrap_or(0.0),
            sources: self.sources,
            reasoning_steps: if detailed {
                self.reasoning_steps
            } else {
                Vec::new()
            },
            iterations_used: self.iteration,
        }
    }
}

/// What [`crate::Orchestrator::execute`] returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub final_answer: String,
    pub confidence_score: f32,
    pub sources: Vec<Source>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub iterations_used: u32,
}

impl QueryResult {
    /// Result for a request whose workflow failed.
    pub fn degraded(reason: &str) -> Self {
        Self {
            final_answer: format!(
                "I encountered an error while processing your question: {}",
                reason
            ),
            confidence_score: 0.0,
            sources: Vec::new(),
            reasoning_steps: Vec::new(),
            iterations_used: 0,
        }
    }
}
