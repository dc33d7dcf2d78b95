//! Properties that hold for every request: trace ordering, iteration
//! accounting, confidence bounds and result shape.

use super::fakes::{doc, web, Behavior, FakeAdapter, FakeCodeHost, ScriptedLlm};
use crate::state::{Node, Question, SourceType};
use crate::{Collaborators, Orchestrator};
use askflow_core::{RetrievalSettings, WorkflowSettings};
use askflow_retrieval::{CodeEntryKind, RetrievedItem};
use std::sync::Arc;
use std::time::Duration;

fn collaborators(
    local: FakeAdapter,
    knowledge_base: FakeAdapter,
    code_host: FakeCodeHost,
    web_adapter: FakeAdapter,
    llm: ScriptedLlm,
) -> Collaborators {
    Collaborators {
        local: Arc::new(local),
        knowledge_base: Some(Arc::new(knowledge_base)),
        code_host: Some(Arc::new(code_host)),
        web: Arc::new(web_adapter),
        llm: Arc::new(llm),
    }
}

fn kb_entry(title: &str) -> RetrievedItem {
    RetrievedItem::KnowledgeBaseEntry {
        title: title.to_string(),
        content: "entry".to_string(),
        relevance: 0.9,
        url: Some(format!("https://virginia.edu/{}", title)),
        resource_type: None,
    }
}

#[tokio::test]
async fn test_parallel_retrieval_keeps_trace_order() {
    // Local finishes last, yet its entry must come first
    let collaborators = collaborators(
        FakeAdapter::new(
            "local",
            Behavior::Sleep(Duration::from_millis(150), vec![doc("slow", 0.9)]),
        ),
        FakeAdapter::returning("knowledge-base", vec![kb_entry("vpn")]),
        FakeCodeHost::new(vec![super::fakes::repo("hoos/askflow")]),
        FakeAdapter::empty("web"),
        ScriptedLlm::new(),
    );
    let workflow = WorkflowSettings {
        parallel_retrieval: true,
        ..WorkflowSettings::default()
    };
    let orchestrator =
        Orchestrator::new(collaborators, workflow, RetrievalSettings::default()).unwrap();

    let result = orchestrator
        .execute(Question::new(
            "Which campus VPN settings does my github repo need?",
            "m",
        ))
        .await;

    let retrieval_nodes: Vec<Node> = result
        .reasoning_steps
        .iter()
        .map(|s| s.node)
        .filter(|n| {
            matches!(
                n,
                Node::LocalSearch | Node::KnowledgeBaseSearch | Node::CodeRepositorySearch
            )
        })
        .collect();
    assert_eq!(
        retrieval_nodes,
        vec![
            Node::LocalSearch,
            Node::KnowledgeBaseSearch,
            Node::CodeRepositorySearch
        ]
    );

    // 3 items at mean 0.9 suffice, so no web search
    let types: Vec<SourceType> = result.sources.iter().map(|s| s.source_type).collect();
    assert_eq!(
        types,
        vec![
            SourceType::Document,
            SourceType::KnowledgeBase,
            SourceType::CodeRepository
        ]
    );
    assert_eq!(result.sources[2].code_kind, Some(CodeEntryKind::Repository));
    assert_eq!(result.sources[2].relevance, 0.9);
}

#[tokio::test]
async fn test_trace_timestamps_never_go_backwards() {
    let collaborators = collaborators(
        FakeAdapter::empty("local"),
        FakeAdapter::empty("knowledge-base"),
        FakeCodeHost::new(Vec::new()),
        FakeAdapter::returning("web", vec![web("w", 0.5)]),
        ScriptedLlm::new(),
    );
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator
        .execute(Question::new("campus parking", "m"))
        .await;

    assert_eq!(result.reasoning_steps.first().map(|s| s.node), Some(Node::AnalyzeQuestion));
    assert!(result
        .reasoning_steps
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(
        result
            .reasoning_steps
            .iter()
            .filter(|s| s.node == Node::GenerateAnswer)
            .count() as u32,
        result.iterations_used
    );
}

#[tokio::test]
async fn test_unparseable_evaluation_defaults_confidence() {
    let collaborators = collaborators(
        FakeAdapter::empty("local"),
        FakeAdapter::empty("knowledge-base"),
        FakeCodeHost::new(Vec::new()),
        FakeAdapter::empty("web"),
        ScriptedLlm::new().with_evaluation("Looks good to me!"),
    );
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator.execute(Question::new("anything", "m")).await;

    assert_eq!(result.confidence_score, 0.7);
    let evaluation = result
        .reasoning_steps
        .iter()
        .find(|s| s.node == Node::EvaluateAnswerQuality)
        .unwrap();
    assert_eq!(evaluation.payload["source"], "defaulted");
    assert_eq!(evaluation.payload["needs_improvement"], false);
}

#[tokio::test]
async fn test_out_of_range_confidence_is_clamped() {
    let collaborators = collaborators(
        FakeAdapter::empty("local"),
        FakeAdapter::empty("knowledge-base"),
        FakeCodeHost::new(Vec::new()),
        FakeAdapter::empty("web"),
        ScriptedLlm::new().with_evaluation(r#"{"overall": 42}"#),
    );
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator.execute(Question::new("anything", "m")).await;
    assert_eq!(result.confidence_score, 1.0);
}

#[tokio::test]
async fn test_brief_result_has_no_trace() {
    let collaborators = collaborators(
        FakeAdapter::empty("local"),
        FakeAdapter::empty("knowledge-base"),
        FakeCodeHost::new(Vec::new()),
        FakeAdapter::returning("web", vec![web("w", 0.5)]),
        ScriptedLlm::new(),
    );
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator
        .execute(Question::new("anything", "m").with_detailed(false))
        .await;

    assert!(result.reasoning_steps.is_empty());
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.iterations_used, 1);
}

#[tokio::test]
async fn test_zero_iteration_budget_is_raised_to_one() {
    let collaborators = collaborators(
        FakeAdapter::empty("local"),
        FakeAdapter::empty("knowledge-base"),
        FakeCodeHost::new(Vec::new()),
        FakeAdapter::empty("web"),
        ScriptedLlm::new(),
    );
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator
        .execute(Question::new("anything", "m").with_max_iterations(0))
        .await;

    assert_eq!(result.iterations_used, 1);
    assert!(!result.final_answer.is_empty());
}

#[tokio::test]
async fn test_missing_optional_collaborators_are_skipped() {
    let collaborators = Collaborators {
        local: Arc::new(FakeAdapter::empty("local")),
        knowledge_base: None,
        code_host: None,
        web: Arc::new(FakeAdapter::empty("web")),
        llm: Arc::new(ScriptedLlm::new()),
    };
    let orchestrator = Orchestrator::new(
        collaborators,
        WorkflowSettings::default(),
        RetrievalSettings::default(),
    )
    .unwrap();

    let result = orchestrator
        .execute(Question::new("List my github repos near campus", "m"))
        .await;

    let skipped = result
        .reasoning_steps
        .iter()
        .filter(|s| s.payload["skipped"] == true)
        .count();
    assert_eq!(skipped, 2);
    assert!(result.sources.is_empty());
}
