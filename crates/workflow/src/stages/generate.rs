//! GenerateAnswer: render the source-grouped context and ask the model for
//! a cited answer. A model failure here ends the workflow.

use crate::context::StageContext;
use crate::state::{EvaluationState, Node, ReasoningStep};
use askflow_core::{AppResult, WorkflowSettings};
use askflow_prompt::build_prompt;
use askflow_retrieval::{CodeEntryKind, RetrievedItem};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write;

/// Render the context block: top local and web results, every
/// knowledge-base and code result, grouped by source family.
pub fn build_context(state: &EvaluationState, settings: &WorkflowSettings) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !state.local_results.is_empty() {
        let mut section = String::from("=== UPLOADED DOCUMENTS ===\n");
        for (idx, item) in state
            .local_results
            .iter()
            .take(settings.local_context_limit)
            .enumerate()
        {
            let page = match item {
                RetrievedItem::DocumentChunk { page: Some(page), .. } => page.to_string(),
                _ => "N/A".to_string(),
            };
            let _ = write!(
                section,
                "\n[Document {}: {} - Page {}]\n{}\n",
                idx + 1,
                item.title(),
                page,
                item.content()
            );
        }
        sections.push(section);
    }

    if !state.knowledge_base_results.is_empty() {
        let mut section = String::from("=== KNOWLEDGE BASE RESOURCES ===\n");
        for (idx, item) in state.knowledge_base_results.iter().enumerate() {
            let _ = write!(
                section,
                "\n[Resource {}: {}]\n{}\n",
                idx + 1,
                item.title(),
                item.content()
            );
            if let Some(locator) = item.locator() {
                let _ = writeln!(section, "URL: {}", locator);
            }
        }
        sections.push(section);
    }

    if !state.code_results.is_empty() {
        let mut section = String::from("=== CODE REPOSITORIES ===\n");
        for (idx, item) in state.code_results.iter().enumerate() {
            write_code_item(&mut section, idx + 1, item);
        }
        sections.push(section);
    }

    if !state.web_results.is_empty() {
        let mut section = String::from("=== WEB SEARCH RESULTS ===\n");
        for (idx, item) in state
            .web_results
            .iter()
            .take(settings.web_context_limit)
            .enumerate()
        {
            let source = item
                .locator()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let _ = write!(
                section,
                "\n[Web Result {}: {}]\n{}\nSource: {}\n",
                idx + 1,
                item.title(),
                item.content(),
                source
            );
        }
        sections.push(section);
    }

    sections.join("\n")
}

fn write_code_item(section: &mut String, position: usize, item: &RetrievedItem) {
    let RetrievedItem::CodeRepositoryEntry {
        title,
        content,
        kind,
        repository,
        url,
        language,
        stars,
        ..
    } = item
    else {
        return;
    };

    let url = url.as_deref().unwrap_or("N/A");
    let language = language.as_deref().unwrap_or("Unknown");

    let _ = match kind {
        CodeEntryKind::Repository => write!(
            section,
            "\n[Repository {}: {}]\nDescription: {}\nLanguage: {}\nStars: {}\nURL: {}\n",
            position,
            title,
            content,
            language,
            stars.unwrap_or(0),
            url
        ),
        CodeEntryKind::Readme => write!(
            section,
            "\n[README {}: {}]\nRepository: {}\n{}\nURL: {}\n",
            position, title, repository, content, url
        ),
    };
}

pub async fn generate_answer(
    mut state: EvaluationState,
    ctx: &StageContext<'_>,
) -> AppResult<EvaluationState> {
    tracing::info!(iteration = state.iteration() + 1, "Generating answer");

    let context = build_context(&state, ctx.workflow);

    let mut variables = HashMap::new();
    variables.insert("institution".to_string(), ctx.workflow.institution.clone());
    variables.insert("context".to_string(), context);
    variables.insert("question".to_string(), ctx.question.text.clone());

    let prompt = build_prompt(&ctx.prompts.generate, &variables)?;
    let answer = ctx
        .complete(
            "answer generation",
            &prompt,
            Some(ctx.workflow.generate_max_tokens),
        )
        .await?;

    let iteration = state.record_answer(answer);

    let payload = json!({
        "iteration": iteration,
        "context_items": {
            "local": state.local_results.len().min(ctx.workflow.local_context_limit),
            "knowledge_base": state.knowledge_base_results.len(),
            "code": state.code_results.len(),
            "web": state.web_results.len().min(ctx.workflow.web_context_limit),
        },
    });
    state.record_step(ReasoningStep::new(
        Node::GenerateAnswer,
        "Generated answer from retrieved context",
        payload,
    ));

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, page: Option<u32>) -> RetrievedItem {
        RetrievedItem::DocumentChunk {
            title: title.to_string(),
            content: format!("{} body", title),
            relevance: 0.6,
            page,
        }
    }

    fn web(title: &str) -> RetrievedItem {
        RetrievedItem::WebResult {
            title: title.to_string(),
            content: "web body".to_string(),
            relevance: 0.5,
            url: None,
        }
    }

    #[test]
    fn test_empty_state_has_empty_context() {
        let context = build_context(&EvaluationState::new(), &WorkflowSettings::default());
        assert!(context.is_empty());
    }

    #[test]
    fn test_local_and_web_are_truncated() {
        let mut state = EvaluationState::new();
        state.local_results = (1..=5).map(|i| doc(&format!("doc{}", i), Some(i))).collect();
        state.web_results = (1..=5).map(|i| web(&format!("web{}", i))).collect();

        let context = build_context(&state, &WorkflowSettings::default());
        assert!(context.contains("[Document 3: doc3 - Page 3]"));
        assert!(!context.contains("doc4"));
        assert!(context.contains("[Web Result 3: web3]\nweb body\nSource: N/A"));
        assert!(!context.contains("web4"));
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let mut state = EvaluationState::new();
        state.web_results = vec![web("w")];
        state.code_results = vec![RetrievedItem::CodeRepositoryEntry {
            title: "hoos/askflow".to_string(),
            content: "No description".to_string(),
            relevance: 0.9,
            kind: CodeEntryKind::Repository,
            repository: "hoos/askflow".to_string(),
            url: None,
            language: Some("Rust".to_string()),
            stars: Some(3),
            private: false,
        }];
        state.knowledge_base_results = vec![RetrievedItem::KnowledgeBaseEntry {
            title: "VPN".to_string(),
            content: "Use AnyConnect".to_string(),
            relevance: 0.8,
            url: Some("https://in.virginia.edu/vpn".to_string()),
            resource_type: None,
        }];
        state.local_results = vec![doc("syllabus", None)];

        let context = build_context(&state, &WorkflowSettings::default());
        let positions: Vec<usize> = [
            "=== UPLOADED DOCUMENTS ===",
            "=== KNOWLEDGE BASE RESOURCES ===",
            "=== CODE REPOSITORIES ===",
            "=== WEB SEARCH RESULTS ===",
        ]
        .iter()
        .map(|header| context.find(header).unwrap())
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(context.contains("Page N/A"));
        assert!(context.contains("URL: https://in.virginia.edu/vpn"));
        assert!(context.contains("Language: Rust\nStars: 3\nURL: N/A"));
    }
}
