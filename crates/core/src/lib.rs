//! Askflow Core Library
//!
//! This crate provides the foundational utilities shared by every askflow crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management, including workflow and retrieval settings

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, RetrievalSettings, WorkflowSettings};
pub use error::{AppError, AppResult};
