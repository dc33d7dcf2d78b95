//! LLM integration crate for askflow.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs) through role-tagged chat messages.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Claude**: Anthropic Messages API
//!
//! # Example
//! ```no_run
//! use askflow_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2")
//!     .with_system("You are a helpful AI research assistant.");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmRole, LlmUsage};
pub use factory::create_client;
pub use providers::{ClaudeClient, OllamaClient};
pub use types::ProviderType;
