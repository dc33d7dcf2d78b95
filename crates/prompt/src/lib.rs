//! Prompt system for askflow.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, built in or overridden per workspace
//! - Handlebars template rendering into system/user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_prompts, load_prompt, resolve_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};

/// Question analysis prompt (JSON output).
pub const ANALYZE_PROMPT_ID: &str = "workflow.analyze";

/// Cited answer generation prompt.
pub const GENERATE_PROMPT_ID: &str = "workflow.generate";

/// Answer self-assessment prompt (JSON output).
pub const EVALUATE_PROMPT_ID: &str = "workflow.evaluate";
