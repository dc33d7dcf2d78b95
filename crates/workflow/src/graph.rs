//! The workflow graph and its runner.
//!
//! ```text
//! analyze -> local -> knowledge base -> code -> sufficiency
//! sufficiency --needs more info--> web -> generate
//! sufficiency --sufficient-------> generate
//! generate -> evaluate
//! evaluate --continue--> web
//! evaluate --finish----> synthesize
//! ```

use crate::context::StageContext;
use crate::stages::{retrieval::parallel_retrieval, run_stage};
use crate::state::{EvaluationState, Node, Question};
use askflow_core::{AppError, AppResult, WorkflowSettings};
use tracing::Instrument;

/// Branch predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Local retrieval judged insufficient
    NeedsMoreInfo,

    /// Loop-back enabled, iterations left and confidence below threshold
    ShouldContinue,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::NeedsMoreInfo => "needs more info",
            Condition::ShouldContinue => "continue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Always(Node),
    Branch {
        condition: Condition,
        if_true: Node,
        if_false: Node,
    },
}

/// Fixed directed graph of stages.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: Node,
    edges: Vec<(Node, Edge)>,
    loop_back: bool,
    confidence_threshold: f32,
}

impl WorkflowGraph {
    pub fn new(settings: &WorkflowSettings) -> Self {
        let edges = vec![
            (Node::AnalyzeQuestion, Edge::Always(Node::LocalSearch)),
            (Node::LocalSearch, Edge::Always(Node::KnowledgeBaseSearch)),
            (
                Node::KnowledgeBaseSearch,
                Edge::Always(Node::CodeRepositorySearch),
            ),
            (
                Node::CodeRepositorySearch,
                Edge::Always(Node::EvaluateLocalSufficiency),
            ),
            (
                Node::EvaluateLocalSufficiency,
                Edge::Branch {
                    condition: Condition::NeedsMoreInfo,
                    if_true: Node::WebSearch,
                    if_false: Node::GenerateAnswer,
                },
            ),
            (Node::WebSearch, Edge::Always(Node::GenerateAnswer)),
            (
                Node::GenerateAnswer,
                Edge::Always(Node::EvaluateAnswerQuality),
            ),
            (
                Node::EvaluateAnswerQuality,
                Edge::Branch {
                    condition: Condition::ShouldContinue,
                    if_true: Node::WebSearch,
                    if_false: Node::SynthesizeFinal,
                },
            ),
        ];

        Self {
            entry: Node::AnalyzeQuestion,
            edges,
            loop_back: settings.loop_back,
            confidence_threshold: settings.confidence_threshold,
        }
    }

    pub fn entry(&self) -> Node {
        self.entry
    }

    /// Outgoing edge of `node`; `None` for the terminal node.
    pub fn edge(&self, node: Node) -> Option<Edge> {
        self.edges
            .iter()
            .find(|(from, _)| *from == node)
            .map(|(_, edge)| *edge)
    }

    pub fn evaluate(&self, condition: Condition, state: &EvaluationState, question: &Question) -> bool {
        match condition {
            Condition::NeedsMoreInfo => state.needs_more_info,
            Condition::ShouldContinue => {
                self.loop_back
                    && state.iteration() < question.max_iterations
                    && state.confidence().unwrap_or(0.0) < self.confidence_threshold
            }
        }
    }

    /// Node to run after `node`, `None` once the terminal node has run.
    pub fn next(&self, node: Node, state: &EvaluationState, question: &Question) -> Option<Node> {
        match self.edge(node)? {
            Edge::Always(to) => Some(to),
            Edge::Branch {
                condition,
                if_true,
                if_false,
            } => Some(if self.evaluate(condition, state, question) {
                if_true
            } else {
                if_false
            }),
        }
    }

    /// Upper bound on node executions for a request. Each loop-back runs
    /// web search, generation and evaluation once more.
    pub fn max_steps(&self, max_iterations: u32) -> usize {
        Node::ALL.len() + 3 * max_iterations as usize
    }

    /// Human-readable edge table.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.edges.len() + 1);
        for (from, edge) in &self.edges {
            match edge {
                Edge::Always(to) => lines.push(format!("{} -> {}", from, to)),
                Edge::Branch {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let disabled = *condition == Condition::ShouldContinue && !self.loop_back;
                    lines.push(format!(
                        "{} -> {} if {}{}",
                        from,
                        if_true,
                        condition.as_str(),
                        if disabled { " (disabled)" } else { "" }
                    ));
                    lines.push(format!("{} -> {} otherwise", from, if_false));
                }
            }
        }
        lines.push(format!("{} (terminal)", Node::SynthesizeFinal));
        lines
    }
}

/// Drive the graph from its entry node to the terminal node.
///
/// With parallel retrieval, reaching LocalSearch runs the local,
/// knowledge-base and code searches together and routing resumes after
/// CodeRepositorySearch.
pub async fn run_graph(
    graph: &WorkflowGraph,
    mut state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    let max_steps = graph.max_steps(ctx.question.max_iterations);
    let mut node = graph.entry();
    let mut steps = 0usize;

    loop {
        steps += 1;
        if steps > max_steps {
            return Err(AppError::Workflow(format!(
                "Workflow exceeded {} steps at {}",
                max_steps, node
            )));
        }

        let span = tracing::info_span!("stage", node = node.as_str());
        let executed = if ctx.workflow.parallel_retrieval && node == Node::LocalSearch {
            state = parallel_retrieval(state, ctx).instrument(span).await?;
            Node::CodeRepositorySearch
        } else {
            state = run_stage(node, state, ctx).instrument(span).await?;
            node
        };

        match graph.next(executed, &state, ctx.question) {
            Some(next) => node = next,
            None => return Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(loop_back: bool) -> WorkflowGraph {
        WorkflowGraph::new(&WorkflowSettings {
            loop_back,
            ..WorkflowSettings::default()
        })
    }

    #[test]
    fn test_linear_chain() {
        let g = graph(false);
        let state = EvaluationState::new();
        let question = Question::new("q", "m");

        assert_eq!(g.entry(), Node::AnalyzeQuestion);
        assert_eq!(
            g.next(Node::AnalyzeQuestion, &state, &question),
            Some(Node::LocalSearch)
        );
        assert_eq!(
            g.next(Node::CodeRepositorySearch, &state, &question),
            Some(Node::EvaluateLocalSufficiency)
        );
        assert_eq!(g.next(Node::SynthesizeFinal, &state, &question), None);
    }

    #[test]
    fn test_sufficiency_branch() {
        let g = graph(false);
        let question = Question::new("q", "m");
        let mut state = EvaluationState::new();

        state.needs_more_info = true;
        assert_eq!(
            g.next(Node::EvaluateLocalSufficiency, &state, &question),
            Some(Node::WebSearch)
        );

        state.needs_more_info = false;
        assert_eq!(
            g.next(Node::EvaluateLocalSufficiency, &state, &question),
            Some(Node::GenerateAnswer)
        );
    }

    #[test]
    fn test_loop_back_disabled_always_finishes() {
        let g = graph(false);
        let question = Question::new("q", "m");
        let mut state = EvaluationState::new();
        state.record_answer("a".to_string());
        state.set_confidence(0.1);

        assert_eq!(
            g.next(Node::EvaluateAnswerQuality, &state, &question),
            Some(Node::SynthesizeFinal)
        );
    }

    #[test]
    fn test_loop_back_enabled() {
        let g = graph(true);
        let question = Question::new("q", "m").with_max_iterations(2);
        let mut state = EvaluationState::new();
        state.record_answer("a".to_string());
        state.set_confidence(0.5);

        assert_eq!(
            g.next(Node::EvaluateAnswerQuality, &state, &question),
            Some(Node::WebSearch)
        );

        state.set_confidence(0.8);
        assert_eq!(
            g.next(Node::EvaluateAnswerQuality, &state, &question),
            Some(Node::SynthesizeFinal)
        );

        state.set_confidence(0.5);
        state.record_answer("b".to_string());
        assert_eq!(
            g.next(Node::EvaluateAnswerQuality, &state, &question),
            Some(Node::SynthesizeFinal)
        );
    }

    #[test]
    fn test_every_non_terminal_node_has_an_edge() {
        let g = graph(false);
        for node in Node::ALL {
            assert_eq!(g.edge(node).is_none(), node == Node::SynthesizeFinal);
        }
    }

    #[test]
    fn test_describe() {
        let lines = graph(false).describe();
        assert!(lines.contains(&"evaluate_local_sufficiency -> web_search if needs more info".to_string()));
        assert!(lines.contains(&"evaluate_answer_quality -> web_search if continue (disabled)".to_string()));
        assert_eq!(lines.last().unwrap(), "synthesize_final (terminal)");
    }
}
