//! Configuration management for askflow.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (`.askflow/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Besides provider selection, the config carries the knobs of the answering
//! workflow (`WorkflowSettings`) and of the retrieval sources
//! (`RetrievalSettings`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .askflow/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider ("ollama" or "claude")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Answering workflow settings
    pub workflow: WorkflowSettings,

    /// Retrieval source settings
    pub retrieval: RetrievalSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Claude {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        #[serde(rename = "apiVersion")]
        api_version: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Claude { model, .. } => model,
            ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if one is configured.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Claude { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Settings for the question-answering workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSettings {
    /// Iteration budget used when a request does not specify one
    pub max_iterations: u32,

    /// Upper bound applied to any requested iteration budget
    pub max_iterations_cap: u32,

    /// Confidence at or above which the generate/evaluate loop stops
    pub confidence_threshold: f32,

    /// Route low-confidence answers back to web search
    pub loop_back: bool,

    /// Run the local, knowledge-base and code searches concurrently
    pub parallel_retrieval: bool,

    /// Minimum number of non-web results for local context to count as sufficient
    pub sufficiency_min_results: usize,

    /// Minimum mean relevance of non-web results for local context to count as sufficient
    pub sufficiency_min_relevance: f32,

    /// Deadline applied to every adapter and language model call
    pub call_timeout_secs: u64,

    /// Return the reasoning trace when a request does not say otherwise
    pub detailed_reasoning: bool,

    /// Institution named in the assistant persona
    pub institution: String,

    /// Token budget for answer generation
    pub generate_max_tokens: u32,

    /// Local document results included in the generation context
    pub local_context_limit: usize,

    /// Web results included in the generation context
    pub web_context_limit: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_iterations_cap: 10,
            confidence_threshold: 0.8,
            loop_back: false,
            parallel_retrieval: false,
            sufficiency_min_results: 3,
            sufficiency_min_relevance: 0.5,
            call_timeout_secs: 30,
            detailed_reasoning: false,
            institution: "the University of Virginia (UVA)".to_string(),
            generate_max_tokens: 2000,
            local_context_limit: 3,
            web_context_limit: 3,
        }
    }
}

impl WorkflowSettings {
    /// Deadline for a single external call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Clamp a requested iteration budget into `1..=max_iterations_cap`.
    pub fn bounded_iterations(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_iterations_cap.max(1))
    }

    fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "workflow.confidenceThreshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.sufficiency_min_relevance) {
            return Err(AppError::Config(format!(
                "workflow.sufficiencyMinRelevance must be within [0, 1], got {}",
                self.sufficiency_min_relevance
            )));
        }
        if self.call_timeout_secs == 0 {
            return Err(AppError::Config(
                "workflow.callTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.max_iterations_cap == 0 {
            return Err(AppError::Config(
                "workflow.maxIterationsCap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the retrieval sources consulted by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// JSONL corpus backing the local document search
    pub documents_path: Option<PathBuf>,

    /// JSONL corpus backing the knowledge-base search
    pub knowledge_base_path: Option<PathBuf>,

    /// Minimum similarity for a local document chunk to be returned
    pub document_min_similarity: f32,

    pub local_max_results: usize,
    pub knowledge_base_max_results: usize,
    pub web_max_results: usize,

    /// Questions must mention one of these for the knowledge base to be searched
    pub knowledge_base_keywords: Vec<String>,

    /// Keywords asking for the requester's repositories
    pub repository_list_keywords: Vec<String>,

    /// Keywords about code-hosting in general (also routed to repository listing)
    pub code_host_keywords: Vec<String>,

    /// Keywords asking for code or implementation details
    pub code_search_keywords: Vec<String>,

    pub repository_list_limit: usize,
    pub code_search_repository_limit: usize,
    pub readme_fetch_limit: usize,
    pub readme_snippet_chars: usize,
    pub repository_relevance: f32,
    pub readme_relevance: f32,

    /// Environment variable holding the Tavily API key
    pub tavily_api_key_env: String,

    /// Environment variable holding the GitHub token of the requester
    pub github_token_env: String,

    /// GitHub REST API base URL
    pub github_api_url: String,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            documents_path: None,
            knowledge_base_path: None,
            document_min_similarity: 0.4,
            local_max_results: 5,
            knowledge_base_max_results: 3,
            web_max_results: 5,
            knowledge_base_keywords: strings(&[
                "uva", "virginia", "onedrive", "vpn", "netbadge", "campus",
            ]),
            repository_list_keywords: strings(&[
                "list",
                "show",
                "my repo",
                "my project",
                "what repo",
                "which repo",
                "my github",
            ]),
            code_host_keywords: strings(&[
                "repository",
                "repo",
                "github",
                "git",
                "pull request",
                "pr",
                "issue",
                "commit",
                "branch",
            ]),
            code_search_keywords: strings(&[
                "code",
                "function",
                "class",
                "implementation",
                "find code",
                "search code",
            ]),
            repository_list_limit: 30,
            code_search_repository_limit: 10,
            readme_fetch_limit: 5,
            readme_snippet_chars: 500,
            repository_relevance: 0.9,
            readme_relevance: 0.7,
            tavily_api_key_env: "TAVILY_API_KEY".to_string(),
            github_token_env: "GITHUB_TOKEN".to_string(),
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    workflow: Option<WorkflowSettings>,
    retrieval: Option<RetrievalSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            workflow: WorkflowSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `ASKFLOW_WORKSPACE`: Override workspace path
    /// - `ASKFLOW_CONFIG`: Path to config file
    /// - `ASKFLOW_PROVIDER`: LLM provider
    /// - `ASKFLOW_MODEL`: Model identifier
    /// - `ASKFLOW_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ASKFLOW_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("ASKFLOW_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.askflow_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ASKFLOW_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ASKFLOW_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("ASKFLOW_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(workflow) = config_file.workflow {
            result.workflow = workflow;
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .askflow directory.
    pub fn askflow_dir(&self) -> PathBuf {
        self.workspace.join(".askflow")
    }

    /// Get the active provider configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Custom endpoint configured for a provider.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Anthropic API version configured for a Claude provider.
    pub fn provider_api_version(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider) {
            Some(ProviderConfig::Claude { api_version, .. }) => api_version.clone(),
            _ => None,
        }
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::Claude { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ if provider == "claude" || provider == "anthropic" => {
                std::env::var("ANTHROPIC_API_KEY").ok()
            }
            _ => None,
        }
    }

    /// Validate configuration for the active provider and the workflow settings.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["ollama", "claude", "anthropic"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if let Some(ProviderConfig::Claude { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if self.api_key.is_none() && std::env::var(api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        self.workflow.validate()
    }
}
