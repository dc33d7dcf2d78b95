//! Retrieval stages: local documents, knowledge base, code host, web.
//!
//! Each search computes a [`RetrievalOutcome`] without touching the state,
//! then [`apply`] writes the result list and the single trace entry. This
//! split lets the three non-web searches run concurrently while their trace
//! entries still land in fixed order.

use crate::classify::{classify_code, classify_knowledge_base, CodeIntent, KnowledgeBaseIntent};
use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep};
use askflow_core::{AppError, AppResult};
use askflow_retrieval::{
    truncate_chars, with_deadline, CodeEntryKind, CodeHost, RepositorySummary, RetrievedItem,
};
use serde_json::json;

/// Result of one retrieval stage, not yet applied to the state.
pub struct RetrievalOutcome {
    node: Node,
    items: Vec<RetrievedItem>,
    step: ReasoningStep,
}

impl RetrievalOutcome {
    fn found(node: Node, noun: &str, items: Vec<RetrievedItem>) -> Self {
        let count = items.len();
        let avg_relevance = if count == 0 {
            0.0
        } else {
            items.iter().map(RetrievedItem::relevance).sum::<f32>() / count as f32
        };

        tracing::info!(node = %node, results = count, "Retrieval complete");

        let step = ReasoningStep::new(
            node,
            format!("Found {} {}", count, noun),
            json!({
                "results_count": count,
                "avg_relevance": avg_relevance,
            }),
        );
        Self { node, items, step }
    }

    fn failed(node: Node, label: &str, error: &AppError) -> Self {
        tracing::warn!(node = %node, error = %error, "Retrieval failed, continuing without results");

        let step = ReasoningStep::new(
            node,
            format!("{} failed: {}", label, error),
            json!({
                "results_count": 0,
                "failed": true,
                "error": error.to_string(),
            }),
        );
        Self {
            node,
            items: Vec::new(),
            step,
        }
    }

    fn skipped(node: Node, label: &str, reason: &str) -> Self {
        tracing::info!(node = %node, reason, "Retrieval skipped");

        let step = ReasoningStep::new(
            node,
            format!("Skipped {}: {}", label, reason),
            json!({
                "results_count": 0,
                "skipped": true,
                "reason": reason,
            }),
        );
        Self {
            node,
            items: Vec::new(),
            step,
        }
    }
}

/// Write an outcome into its result list and append its trace entry.
pub fn apply(mut state: EvaluationState, outcome: RetrievalOutcome) -> EvaluationState {
    let RetrievalOutcome { node, items, step } = outcome;
    match node {
        Node::LocalSearch => state.local_results = items,
        Node::KnowledgeBaseSearch => state.knowledge_base_results = items,
        Node::CodeRepositorySearch => state.code_results = items,
        Node::WebSearch => state.web_results = items,
        other => {
            tracing::error!(node = %other, "Retrieval outcome attributed to a non-retrieval node");
        }
    }
    state.record_step(step);
    state
}

async fn search_local(ctx: &StageContext<'_>) -> RetrievalOutcome {
    let adapter = &ctx.collaborators.local;
    let search = adapter.search(&ctx.question.text, ctx.retrieval.local_max_results);

    match with_deadline("local document search", ctx.workflow.call_timeout(), search).await {
        Ok(items) => RetrievalOutcome::found(Node::LocalSearch, "relevant document chunks", items),
        Err(e) => RetrievalOutcome::failed(Node::LocalSearch, "Local document search", &e),
    }
}

async fn search_knowledge_base(ctx: &StageContext<'_>) -> RetrievalOutcome {
    const LABEL: &str = "knowledge-base search";

    let Some(adapter) = &ctx.collaborators.knowledge_base else {
        return RetrievalOutcome::skipped(
            Node::KnowledgeBaseSearch,
            LABEL,
            "no knowledge base configured",
        );
    };

    let intent = classify_knowledge_base(&ctx.question.text, &ctx.retrieval.knowledge_base_keywords);
    if intent == KnowledgeBaseIntent::NotRelevant {
        return RetrievalOutcome::skipped(
            Node::KnowledgeBaseSearch,
            LABEL,
            "question does not mention knowledge-base topics",
        );
    }

    let search = adapter.search(&ctx.question.text, ctx.retrieval.knowledge_base_max_results);
    match with_deadline(LABEL, ctx.workflow.call_timeout(), search).await {
        Ok(items) => RetrievalOutcome::found(
            Node::KnowledgeBaseSearch,
            "relevant knowledge-base entries",
            items,
        ),
        Err(e) => RetrievalOutcome::failed(Node::KnowledgeBaseSearch, "Knowledge-base search", &e),
    }
}

async fn search_code(ctx: &StageContext<'_>) -> RetrievalOutcome {
    const LABEL: &str = "code repository search";

    let Some(host) = &ctx.collaborators.code_host else {
        return RetrievalOutcome::skipped(
            Node::CodeRepositorySearch,
            LABEL,
            "no code-hosting integration configured for the requester",
        );
    };

    let settings = ctx.retrieval;
    let intent = classify_code(
        &ctx.question.text,
        &settings.repository_list_keywords,
        &settings.code_host_keywords,
        &settings.code_search_keywords,
    );

    let result = match intent {
        CodeIntent::Unrelated => {
            return RetrievalOutcome::skipped(
                Node::CodeRepositorySearch,
                LABEL,
                "question does not concern code repositories",
            );
        }
        CodeIntent::ListRepositories => list_repositories(host.as_ref(), ctx).await,
        CodeIntent::SearchCode => search_readmes(host.as_ref(), ctx).await,
    };

    tracing::debug!(intent = intent.as_str(), host = host.name(), "Code intent classified");

    match result {
        Ok(items) => {
            let mut outcome = RetrievalOutcome::found(
                Node::CodeRepositorySearch,
                "code-repository resources",
                items,
            );
            outcome.step.payload["intent"] = json!(intent);
            outcome
        }
        Err(e) => {
            let mut outcome =
                RetrievalOutcome::failed(Node::CodeRepositorySearch, "Code repository search", &e);
            outcome.step.payload["intent"] = json!(intent);
            outcome
        }
    }
}

fn repository_item(repo: RepositorySummary, relevance: f32) -> RetrievedItem {
    RetrievedItem::CodeRepositoryEntry {
        title: repo.full_name.clone(),
        content: repo
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "No description".to_string()),
        relevance,
        kind: CodeEntryKind::Repository,
        repository: repo.full_name,
        url: Some(repo.url),
        language: repo.language,
        stars: Some(repo.stars),
        private: repo.private,
    }
}

async fn list_repositories(
    host: &dyn CodeHost,
    ctx: &StageContext<'_>,
) -> AppResult<Vec<RetrievedItem>> {
    let settings = ctx.retrieval;
    let repos = with_deadline(
        "repository listing",
        ctx.workflow.call_timeout(),
        host.list_repositories(settings.repository_list_limit),
    )
    .await?;

    Ok(repos
        .into_iter()
        .map(|repo| repository_item(repo, settings.repository_relevance))
        .collect())
}

/// README snippets of the most recently updated repositories. A README
/// that cannot be fetched is skipped, not fatal.
async fn search_readmes(
    host: &dyn CodeHost,
    ctx: &StageContext<'_>,
) -> AppResult<Vec<RetrievedItem>> {
    let settings = ctx.retrieval;
    let timeout = ctx.workflow.call_timeout();

    let repos = with_deadline(
        "repository listing",
        timeout,
        host.list_repositories(settings.code_search_repository_limit),
    )
    .await?;

    let mut items = Vec::new();
    for repo in repos.into_iter().take(settings.readme_fetch_limit) {
        match with_deadline("README fetch", timeout, host.readme(&repo.full_name)).await {
            Ok(Some(readme)) if !readme.trim().is_empty() => {
                items.push(RetrievedItem::CodeRepositoryEntry {
                    title: format!("{} - README", repo.full_name),
                    content: truncate_chars(&readme, settings.readme_snippet_chars),
                    relevance: settings.readme_relevance,
                    kind: CodeEntryKind::Readme,
                    repository: repo.full_name,
                    url: Some(repo.url),
                    language: repo.language,
                    stars: None,
                    private: repo.private,
                });
            }
            Ok(_) => {
                tracing::debug!(repository = %repo.full_name, "Repository has no README");
            }
            Err(e) => {
                tracing::debug!(repository = %repo.full_name, error = %e, "Skipping README");
            }
        }
    }

    Ok(items)
}

async fn search_web(ctx: &StageContext<'_>) -> RetrievalOutcome {
    let search = ctx
        .collaborators
        .web
        .search(&ctx.question.text, ctx.retrieval.web_max_results);

    match with_deadline("web search", ctx.workflow.call_timeout(), search).await {
        Ok(items) => RetrievalOutcome::found(Node::WebSearch, "web results", items),
        Err(e) => RetrievalOutcome::failed(Node::WebSearch, "Web search", &e),
    }
}

pub async fn local_search(
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Searching local documents");
    Ok(apply(state, search_local(ctx).await))
}

pub async fn knowledge_base_search(
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Searching knowledge base");
    Ok(apply(state, search_knowledge_base(ctx).await))
}

pub async fn code_repository_search(
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Searching code repositories");
    Ok(apply(state, search_code(ctx).await))
}

pub async fn web_search(
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Searching the web");
    Ok(apply(state, search_web(ctx).await))
}

/// Local, knowledge-base and code searches run concurrently; outcomes are
/// applied in that fixed order whatever the completion order.
pub async fn parallel_retrieval(
    state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!("Running local, knowledge-base and code searches concurrently");

    let (local, knowledge_base, code) = futures::join!(
        search_local(ctx),
        search_knowledge_base(ctx),
        search_code(ctx)
    );

    let state = apply(state, local);
    let state = apply(state, knowledge_base);
    Ok(apply(state, code))
}
