//! Shared, read-only inputs of every stage.

use crate::state::Question;
use askflow_core::{AppResult, RetrievalSettings, WorkflowSettings};
use askflow_llm::{LlmClient, LlmRequest};
use askflow_prompt::{
    resolve_prompt, BuiltPrompt, PromptDefinition, ANALYZE_PROMPT_ID, EVALUATE_PROMPT_ID,
    GENERATE_PROMPT_ID,
};
use askflow_retrieval::{with_deadline, CodeHost, RetrievalAdapter};
use std::path::Path;
use std::sync::Arc;

/// Long-lived capability handles injected at orchestrator construction.
#[derive(Clone)]
pub struct Collaborators {
    pub local: Arc<dyn RetrievalAdapter>,

    /// Curated institutional resources; `None` skips the stage
    pub knowledge_base: Option<Arc<dyn RetrievalAdapter>>,

    /// Code-hosting integration for the requester; `None` skips the stage
    pub code_host: Option<Arc<dyn CodeHost>>,

    pub web: Arc<dyn RetrievalAdapter>,

    pub llm: Arc<dyn LlmClient>,
}

/// The three prompt definitions the workflow renders.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub analyze: PromptDefinition,
    pub generate: PromptDefinition,
    pub evaluate: PromptDefinition,
}

impl PromptSet {
    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        Self::resolve(None)
    }

    /// Built-in prompts, overridden by `.askflow/prompts/<id>.yml` in the
    /// workspace when present.
    pub fn resolve(workspace: Option<&Path>) -> AppResult<Self> {
        Ok(Self {
            analyze: resolve_prompt(workspace, ANALYZE_PROMPT_ID)?,
            generate: resolve_prompt(workspace, GENERATE_PROMPT_ID)?,
            evaluate: resolve_prompt(workspace, EVALUATE_PROMPT_ID)?,
        })
    }
}

/// Everything a stage may read.
pub struct StageContext<'a> {
    pub question: &'a Question,
    pub collaborators: &'a Collaborators,
    pub workflow: &'a WorkflowSettings,
    pub retrieval: &'a RetrievalSettings,
    pub prompts: &'a PromptSet,
}

impl StageContext<'_> {
    /// One deadline-bounded language-model call with the requester's model.
    pub async fn complete(
        &self,
        operation: &str,
        prompt: &BuiltPrompt,
        max_tokens: Option<u32>,
    ) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt.user.clone(), self.question.model.clone());
        if let Some(system) = &prompt.system {
            request = request.with_system(system.clone());
        }
        if let Some(max_tokens) = max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let llm = &self.collaborators.llm;
        let response = with_deadline(operation, self.workflow.call_timeout(), llm.complete(&request)).await?;

        tracing::debug!(
            operation,
            provider = llm.provider_name(),
            tokens = response.usage.total_tokens,
            "Model call complete"
        );

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_prompt_set() {
        let prompts = PromptSet::builtin().unwrap();
        assert_eq!(prompts.analyze.id, ANALYZE_PROMPT_ID);
        assert_eq!(prompts.generate.id, GENERATE_PROMPT_ID);
        assert_eq!(prompts.evaluate.id, EVALUATE_PROMPT_ID);
    }

    #[test]
    fn test_workspace_override_replaces_one_prompt() {
        let workspace = TempDir::new().unwrap();
        let prompts_dir = workspace.path().join(".askflow/prompts");
        std::fs::create_dir_all(&prompts_dir).unwrap();
        std::fs::write(
            prompts_dir.join("workflow.generate.yml"),
            r#"id: workflow.generate
title: Terse answers
apiVersion: "1.0"
template: "Answer briefly: {{question}}"
output:
  format: text
"#,
        )
        .unwrap();

        let prompts = PromptSet::resolve(Some(workspace.path())).unwrap();
        assert_eq!(prompts.generate.title, "Terse answers");
        assert!(prompts.generate.system.is_none());
        assert_eq!(prompts.analyze.output.format, "json");
    }
}
