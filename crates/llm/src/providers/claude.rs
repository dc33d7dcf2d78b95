//! Anthropic Claude provider implementation.
//!
//! Messages API: https://docs.anthropic.com/en/api/messages

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use askflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Anthropic requires `max_tokens` on every request.
const DEFAULT_MAX_TOKENS: u32 = 2000;

const DEFAULT_SYSTEM: &str = "You are a helpful AI research assistant.";

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    model: String,
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ClaudeUsage,
}

/// Anthropic Claude client.
pub struct ClaudeClient {
    base_url: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl ClaudeClient {
    pub const DEFAULT_URL: &'static str = "https://api.anthropic.com";
    pub const DEFAULT_API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_URL.to_string(),
            api_key: api_key.into(),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn to_claude_request(&self, request: &LlmRequest) -> ClaudeRequest {
        ClaudeRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request
                .system
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM.to_string()),
            messages: request
                .messages
                .iter()
                .map(|m| ClaudeMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
        }
    }

    fn convert_response(&self, response: ClaudeResponse) -> AppResult<LlmResponse> {
        let content: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        if content.is_empty() {
            return Err(AppError::Llm(
                "Claude response contained no text content".to_string(),
            ));
        }

        Ok(LlmResponse {
            content,
            model: response.model,
            usage: LlmUsage::new(response.usage.input_tokens, response.usage.output_tokens),
            done: response.stop_reason.as_deref() != Some("max_tokens"),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for ClaudeClient {
    fn provider_name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending messages request to Claude");

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&self.to_claude_request(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Claude: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Claude API error ({}): {}",
                status, error_text
            )));
        }

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Claude response: {}", e)))?;

        self.convert_response(claude_response)
    }
}
