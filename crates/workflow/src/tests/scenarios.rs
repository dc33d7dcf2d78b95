//! Branching scenarios: web escalation, adapter failures, model failure,
//! sufficient local context, loop-back, deadlines and panics.

use super::fakes::{doc, repo, web, Behavior, FakeAdapter, FakeCodeHost, ScriptedLlm};
use crate::state::{Node, QueryResult, Question, SourceType};
use crate::{Collaborators, Orchestrator};
use askflow_core::{RetrievalSettings, WorkflowSettings};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const CAMPUS_QUESTION: &str = "How do I set up the campus VPN for my github repo?";

struct Harness {
    local: Arc<FakeAdapter>,
    knowledge_base: Arc<FakeAdapter>,
    code_host: Arc<FakeCodeHost>,
    web: Arc<FakeAdapter>,
    llm: Arc<ScriptedLlm>,
}

impl Harness {
    fn new() -> Self {
        Self {
            local: Arc::new(FakeAdapter::empty("local")),
            knowledge_base: Arc::new(FakeAdapter::empty("knowledge-base")),
            code_host: Arc::new(FakeCodeHost::new(Vec::new())),
            web: Arc::new(FakeAdapter::returning(
                "web",
                vec![web("vpn-howto", 0.8), web("anyconnect", 0.6)],
            )),
            llm: Arc::new(ScriptedLlm::new()),
        }
    }

    fn orchestrator(&self, workflow: WorkflowSettings) -> Orchestrator {
        let collaborators = Collaborators {
            local: self.local.clone(),
            knowledge_base: Some(self.knowledge_base.clone()),
            code_host: Some(self.code_host.clone()),
            web: self.web.clone(),
            llm: self.llm.clone(),
        };
        Orchestrator::new(collaborators, workflow, RetrievalSettings::default()).unwrap()
    }

    async fn ask(&self, question: &str) -> QueryResult {
        self.orchestrator(WorkflowSettings::default())
            .execute(Question::new(question, "test-model"))
            .await
    }
}

fn nodes(result: &QueryResult) -> Vec<Node> {
    result.reasoning_steps.iter().map(|s| s.node).collect()
}

fn position(result: &QueryResult, node: Node) -> Option<usize> {
    nodes(result).iter().position(|n| *n == node)
}

#[tokio::test]
async fn test_no_local_matches_escalates_to_web() {
    let harness = Harness::new();
    let result = harness.ask(CAMPUS_QUESTION).await;

    let web_at = position(&result, Node::WebSearch).expect("web search ran");
    let generate_at = position(&result, Node::GenerateAnswer).expect("generation ran");
    assert!(web_at < generate_at);

    assert_eq!(harness.web.calls(), 1);
    assert_eq!(harness.knowledge_base.calls(), 1);
    assert_eq!(harness.code_host.list_calls.load(Ordering::SeqCst), 1);

    assert_eq!(result.sources.len(), 2);
    assert!(result.sources.iter().all(|s| s.source_type == SourceType::Web));
    assert_eq!(
        result.final_answer,
        "Connect with the Cisco AnyConnect client [1]."
    );
    assert_eq!(result.confidence_score, 0.9);
    assert_eq!(result.iterations_used, 1);
}

#[tokio::test]
async fn test_failing_adapters_are_recorded_and_survived() {
    let harness = Harness {
        local: Arc::new(FakeAdapter::failing("local")),
        knowledge_base: Arc::new(FakeAdapter::failing("knowledge-base")),
        code_host: Arc::new(FakeCodeHost::failing()),
        web: Arc::new(FakeAdapter::empty("web")),
        ..Harness::new()
    };
    let result = harness.ask(CAMPUS_QUESTION).await;

    let failures: Vec<Node> = result
        .reasoning_steps
        .iter()
        .filter(|s| s.payload["failed"] == true)
        .map(|s| s.node)
        .collect();
    assert_eq!(
        failures,
        vec![
            Node::LocalSearch,
            Node::KnowledgeBaseSearch,
            Node::CodeRepositorySearch
        ]
    );

    assert_eq!(nodes(&result).last(), Some(&Node::SynthesizeFinal));
    assert!(result.sources.is_empty());
    assert_eq!(
        result.final_answer,
        "Connect with the Cisco AnyConnect client [1]."
    );
    assert_eq!(result.iterations_used, 1);
}

#[tokio::test]
async fn test_generation_failure_degrades_result() {
    let harness = Harness {
        local: Arc::new(FakeAdapter::returning("local", vec![doc("guide", 0.9)])),
        llm: Arc::new(ScriptedLlm::new().failing_generation()),
        ..Harness::new()
    };
    let result = harness.ask(CAMPUS_QUESTION).await;

    assert!(result
        .final_answer
        .starts_with("I encountered an error while processing your question:"));
    assert!(result.final_answer.contains("model overloaded"));
    assert_eq!(result.confidence_score, 0.0);
    assert!(result.sources.is_empty());
    assert!(result.reasoning_steps.is_empty());
    assert_eq!(result.iterations_used, 0);
}

#[tokio::test]
async fn test_sufficient_local_context_skips_web() {
    let local_items = vec![
        doc("a", 0.4),
        doc("b", 0.5),
        doc("c", 0.6),
        doc("d", 0.7),
        doc("e", 0.8),
    ];
    let harness = Harness {
        local: Arc::new(FakeAdapter::returning("local", local_items)),
        ..Harness::new()
    };
    let result = harness.ask("Summarize chapter two of the reading").await;

    assert_eq!(harness.web.calls(), 0);
    assert!(position(&result, Node::WebSearch).is_none());
    assert_eq!(result.sources.len(), 5);
    assert!(result
        .sources
        .iter()
        .all(|s| s.source_type == SourceType::Document));

    let sufficiency = result
        .reasoning_steps
        .iter()
        .find(|s| s.node == Node::EvaluateLocalSufficiency)
        .unwrap();
    assert_eq!(sufficiency.payload["needs_web_search"], false);
    assert_eq!(sufficiency.action, "Sufficient information from local sources");

    let prompt = harness.llm.last_generate_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("=== UPLOADED DOCUMENTS ==="));
    assert!(!prompt.contains("=== WEB SEARCH RESULTS ==="));
}

#[tokio::test]
async fn test_unrelated_question_skips_gated_stages() {
    let harness = Harness::new();
    let result = harness.ask("Explain photosynthesis").await;

    assert_eq!(harness.knowledge_base.calls(), 0);
    assert_eq!(harness.code_host.list_calls.load(Ordering::SeqCst), 0);

    let skipped: Vec<Node> = result
        .reasoning_steps
        .iter()
        .filter(|s| s.payload["skipped"] == true)
        .map(|s| s.node)
        .collect();
    assert_eq!(
        skipped,
        vec![Node::KnowledgeBaseSearch, Node::CodeRepositorySearch]
    );
}

#[tokio::test]
async fn test_code_search_collects_readmes() {
    let host = FakeCodeHost::new(vec![
        repo("hoos/parser"),
        repo("hoos/no-readme"),
        repo("hoos/site"),
    ])
    .with_readme("hoos/parser", &"The parser module tokenizes input. ".repeat(40))
    .with_readme("hoos/site", "Static site");

    let harness = Harness {
        code_host: Arc::new(host),
        ..Harness::new()
    };
    let result = harness
        .ask("Where is the tokenizer function implemented?")
        .await;

    assert_eq!(harness.code_host.readme_calls.load(Ordering::SeqCst), 3);

    let code_sources: Vec<_> = result
        .sources
        .iter()
        .filter(|s| s.source_type == SourceType::CodeRepository)
        .collect();
    assert_eq!(code_sources.len(), 2);
    assert_eq!(code_sources[0].title, "hoos/parser - README");
    assert_eq!(code_sources[0].relevance, 0.7);

    let step = result
        .reasoning_steps
        .iter()
        .find(|s| s.node == Node::CodeRepositorySearch)
        .unwrap();
    assert_eq!(step.payload["intent"], "search_code");
    assert_eq!(step.payload["results_count"], 2);
}

#[tokio::test]
async fn test_loop_back_runs_until_iteration_budget() {
    let harness = Harness {
        llm: Arc::new(ScriptedLlm::new().with_overall(0.3)),
        ..Harness::new()
    };
    let workflow = WorkflowSettings {
        loop_back: true,
        ..WorkflowSettings::default()
    };

    let result = harness
        .orchestrator(workflow)
        .execute(Question::new(CAMPUS_QUESTION, "test-model").with_max_iterations(3))
        .await;

    assert_eq!(harness.llm.generations(), 3);
    assert_eq!(result.iterations_used, 3);
    assert_eq!(harness.web.calls(), 3);
    assert_eq!(result.confidence_score, 0.3);
    assert_eq!(nodes(&result).last(), Some(&Node::SynthesizeFinal));
}

#[tokio::test]
async fn test_loop_back_stops_on_confident_answer() {
    let harness = Harness::new();
    let workflow = WorkflowSettings {
        loop_back: true,
        ..WorkflowSettings::default()
    };

    let result = harness
        .orchestrator(workflow)
        .execute(Question::new(CAMPUS_QUESTION, "test-model").with_max_iterations(3))
        .await;

    assert_eq!(harness.llm.generations(), 1);
    assert_eq!(result.iterations_used, 1);
}

#[tokio::test]
async fn test_default_policy_is_single_pass() {
    let harness = Harness {
        llm: Arc::new(ScriptedLlm::new().with_overall(0.1)),
        ..Harness::new()
    };
    let result = harness.ask(CAMPUS_QUESTION).await;

    assert_eq!(harness.llm.generations(), 1);
    assert_eq!(result.iterations_used, 1);
    assert_eq!(result.confidence_score, 0.1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_adapter_times_out_as_failure() {
    let harness = Harness {
        local: Arc::new(FakeAdapter::new(
            "local",
            Behavior::Sleep(Duration::from_secs(5), vec![doc("late", 0.9)]),
        )),
        ..Harness::new()
    };
    let workflow = WorkflowSettings {
        call_timeout_secs: 1,
        ..WorkflowSettings::default()
    };

    let result = harness
        .orchestrator(workflow)
        .execute(Question::new(CAMPUS_QUESTION, "test-model"))
        .await;

    let local = result
        .reasoning_steps
        .iter()
        .find(|s| s.node == Node::LocalSearch)
        .unwrap();
    assert_eq!(local.payload["failed"], true);
    assert!(local.payload["error"]
        .as_str()
        .unwrap()
        .contains("timed out"));
    assert!(result.confidence_score > 0.0);
    assert_eq!(result.iterations_used, 1);
}

#[tokio::test]
async fn test_panicking_adapter_degrades_result() {
    let harness = Harness {
        web: Arc::new(FakeAdapter::new("web", Behavior::Panic)),
        ..Harness::new()
    };
    let result = harness.ask(CAMPUS_QUESTION).await;

    assert!(result.final_answer.contains("web adapter exploded"));
    assert_eq!(result.confidence_score, 0.0);
    assert!(result.sources.is_empty());
    assert_eq!(result.iterations_used, 0);
}
