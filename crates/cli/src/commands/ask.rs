//! Ask command handler.
//!
//! Wires the configured retrieval adapters and language model into an
//! [`Orchestrator`] and prints the answer.

use askflow_core::{config::AppConfig, AppError, AppResult, WorkflowSettings};
use askflow_llm::create_client;
use askflow_retrieval::{
    CodeHost, CorpusKind, GitHubHost, JsonlCorpus, RetrievalAdapter, TavilySearch,
    UnconfiguredAdapter,
};
use askflow_workflow::{Collaborators, Orchestrator, PromptSet, QueryResult, Question};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ask a question and get a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Maximum generate/evaluate iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Include the reasoning trace in the output
    #[arg(long)]
    pub detailed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Caller identity recorded in logs
    #[arg(long, env = "ASKFLOW_USER_ID")]
    pub user_id: Option<String>,

    /// Ask with administrator privileges
    #[arg(long)]
    pub admin: bool,

    /// JSONL corpus of uploaded documents
    #[arg(long)]
    pub documents: Option<PathBuf>,

    /// JSONL corpus of knowledge-base resources
    #[arg(short, long)]
    pub knowledge_base: Option<PathBuf>,

    /// Run local, knowledge-base and code retrieval concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Loop back to generation while confidence stays below the threshold
    #[arg(long)]
    pub loop_back: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        config.validate()?;

        let text = self
            .get_question()?
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        let mut workflow = config.workflow.clone();
        workflow.parallel_retrieval |= self.parallel;
        workflow.loop_back |= self.loop_back;

        let collaborators = self.build_collaborators(config)?;
        let prompts = PromptSet::resolve(Some(&config.workspace))?;
        let orchestrator = Orchestrator::new(collaborators, workflow.clone(), config.retrieval.clone())?
            .with_prompts(prompts);

        let detailed = self.wants_trace(&workflow);
        let mut question = Question::new(text, config.model.clone())
            .with_admin(self.admin)
            .with_detailed(detailed)
            .with_max_iterations(self.max_iterations.unwrap_or(workflow.max_iterations));
        if let Some(user_id) = &self.user_id {
            question = question.with_user(user_id.clone());
        }

        let result = orchestrator.execute(question).await;

        if self.json {
            let output = serde_json::to_string_pretty(&result)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", output);
        } else {
            print_result(&result, detailed);
        }

        Ok(())
    }

    /// `--detailed`, or `workflow.detailedReasoning` from the config. Governs
    /// both the JSON and the text output.
    fn wants_trace(&self, workflow: &WorkflowSettings) -> bool {
        self.detailed || workflow.detailed_reasoning
    }

    /// Question text from the positional argument or `--file`.
    fn get_question(&self) -> AppResult<Option<String>> {
        if let Some(question) = &self.question {
            return Ok(Some(question.clone()));
        }
        match &self.file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            None => Ok(None),
        }
    }

    fn build_collaborators(&self, config: &AppConfig) -> AppResult<Collaborators> {
        let retrieval = &config.retrieval;
        let snippet_chars = retrieval.readme_snippet_chars;

        let documents = self
            .documents
            .clone()
            .or_else(|| retrieval.documents_path.clone());
        let local: Arc<dyn RetrievalAdapter> = match documents {
            Some(path) => {
                let path = resolve_path(&config.workspace, &path);
                tracing::debug!("Loading document corpus from {:?}", path);
                Arc::new(
                    JsonlCorpus::open(&path, CorpusKind::Documents)?
                        .with_min_similarity(retrieval.document_min_similarity)
                        .with_snippet_chars(snippet_chars),
                )
            }
            None => Arc::new(UnconfiguredAdapter::new(
                "documents",
                "pass --documents or set retrieval.documents_path",
            )),
        };

        let knowledge_base_path = self
            .knowledge_base
            .clone()
            .or_else(|| retrieval.knowledge_base_path.clone());
        let knowledge_base = match knowledge_base_path {
            Some(path) => {
                let path = resolve_path(&config.workspace, &path);
                tracing::debug!("Loading knowledge base from {:?}", path);
                let corpus = JsonlCorpus::open(&path, CorpusKind::KnowledgeBase)?
                    .with_snippet_chars(snippet_chars);
                Some(Arc::new(corpus) as Arc<dyn RetrievalAdapter>)
            }
            None => None,
        };

        let code_host = non_empty_env(&retrieval.github_token_env).map(|token| {
            tracing::debug!("GitHub code host enabled");
            Arc::new(GitHubHost::with_api_url(token, retrieval.github_api_url.clone()))
                as Arc<dyn CodeHost>
        });

        let web: Arc<dyn RetrievalAdapter> = match non_empty_env(&retrieval.tavily_api_key_env) {
            Some(key) => Arc::new(TavilySearch::new(key)),
            None => Arc::new(UnconfiguredAdapter::new(
                "web",
                format!("set {} to enable web search", retrieval.tavily_api_key_env),
            )),
        };

        let endpoint = config.provider_endpoint(&config.provider);
        let api_key = config.resolve_api_key(&config.provider);
        let api_version = config.provider_api_version(&config.provider);
        let llm = create_client(
            &config.provider,
            endpoint.as_deref(),
            api_key.as_deref(),
            api_version.as_deref(),
        )?;

        Ok(Collaborators {
            local,
            knowledge_base,
            code_host,
            web,
            llm,
        })
    }
}

fn resolve_path(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn print_result(result: &QueryResult, detailed: bool) {
    println!("{}\n", result.final_answer);
    println!(
        "Confidence: {:.2} | Iterations: {}",
        result.confidence_score, result.iterations_used
    );

    if !result.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in result.sources.iter().enumerate() {
            match &source.locator {
                Some(locator) => println!(
                    "  {}. [{}] {} ({}) - {:.2}",
                    i + 1,
                    source.source_type.as_str(),
                    source.title,
                    locator,
                    source.relevance
                ),
                None => println!(
                    "  {}. [{}] {} - {:.2}",
                    i + 1,
                    source.source_type.as_str(),
                    source.title,
                    source.relevance
                ),
            }
        }
    }

    if detailed && !result.reasoning_steps.is_empty() {
        println!("\nReasoning:");
        for step in &result.reasoning_steps {
            println!(
                "  {} [{}] {}",
                step.timestamp.format("%H:%M:%S%.3f"),
                step.node,
                step.action
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(detailed: bool) -> AskCommand {
        AskCommand {
            question: Some("What is in my github?".to_string()),
            file: None,
            max_iterations: None,
            detailed,
            json: true,
            user_id: None,
            admin: false,
            documents: None,
            knowledge_base: None,
            parallel: false,
            loop_back: false,
        }
    }

    #[test]
    fn test_trace_follows_detailed_flag() {
        let settings = WorkflowSettings::default();
        assert!(!command(false).wants_trace(&settings));
        assert!(command(true).wants_trace(&settings));
    }

    #[test]
    fn test_trace_enabled_by_config() {
        let settings = WorkflowSettings {
            detailed_reasoning: true,
            ..WorkflowSettings::default()
        };
        assert!(command(false).wants_trace(&settings));
    }

    #[test]
    fn test_resolve_relative_path() {
        let workspace = Path::new("/tmp/ws");
        assert_eq!(
            resolve_path(workspace, Path::new("docs.jsonl")),
            PathBuf::from("/tmp/ws/docs.jsonl")
        );
        assert_eq!(
            resolve_path(workspace, Path::new("/data/kb.jsonl")),
            PathBuf::from("/data/kb.jsonl")
        );
    }
}
