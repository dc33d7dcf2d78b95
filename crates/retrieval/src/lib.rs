//! Retrieval adapters for askflow.
//!
//! This crate defines the retrieval boundary of the workflow:
//! - [`RetrievedItem`], the tagged union every adapter produces
//! - [`RetrievalAdapter`] and [`CodeHost`], the traits the workflow consumes
//! - [`with_deadline`], the per-call deadline wrapper
//! - concrete adapters: JSONL corpora, Tavily web search, GitHub

pub mod adapter;
pub mod corpus;
pub mod embedding;
pub mod github;
pub mod tavily;
pub mod types;

pub use adapter::{with_deadline, CodeHost, RetrievalAdapter, UnconfiguredAdapter};
pub use corpus::{CorpusKind, CorpusRecord, JsonlCorpus};
pub use embedding::{cosine_similarity, TrigramEmbedder};
pub use github::GitHubHost;
pub use tavily::TavilySearch;
pub use types::{truncate_chars, CodeEntryKind, Locator, RepositorySummary, RetrievedItem};
