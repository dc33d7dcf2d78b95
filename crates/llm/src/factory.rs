//! LLM provider factory.
//!
//! Creates LLM clients from a provider name and its optional endpoint, API
//! key and API version.

use crate::client::LlmClient;
use crate::providers::{ClaudeClient, OllamaClient};
use crate::types::ProviderType;
use askflow_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "claude"/"anthropic")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by Claude)
/// * `api_version` - Optional Anthropic API version (Claude only)
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    api_version: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let base_url = endpoint.unwrap_or(OllamaClient::DEFAULT_URL);
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        Some(ProviderType::Claude) => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Claude provider requires API key".to_string())
            })?;
            let mut client = ClaudeClient::new(api_key);
            if let Some(endpoint) = endpoint {
                client = client.with_base_url(endpoint);
            }
            if let Some(api_version) = api_version {
                client = client.with_api_version(api_version);
            }
            Ok(Arc::new(client))
        }
        None => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}
