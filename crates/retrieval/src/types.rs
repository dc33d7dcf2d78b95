//! Retrieval result types.
//!
//! Every adapter produces [`RetrievedItem`]s; downstream stages only read them.

use serde::{Deserialize, Serialize};

/// Where a retrieved item can be found again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Page number inside an uploaded document
    Page(u32),

    /// Web or knowledge-base URL
    Url(String),

    /// `owner/repo` path on a code host
    RepositoryPath(String),
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Page(page) => write!(f, "page {}", page),
            Locator::Url(url) => write!(f, "{}", url),
            Locator::RepositoryPath(path) => write!(f, "{}", path),
        }
    }
}

/// Shape of a code-repository entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEntryKind {
    /// Repository metadata (list intent)
    Repository,

    /// README snippet (code-search intent)
    Readme,
}

impl CodeEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeEntryKind::Repository => "repository",
            CodeEntryKind::Readme => "readme",
        }
    }
}

/// A single ranked result from one of the four source families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrievedItem {
    DocumentChunk {
        title: String,
        content: String,
        relevance: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
    },
    KnowledgeBaseEntry {
        title: String,
        content: String,
        relevance: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource_type: Option<String>,
    },
    CodeRepositoryEntry {
        title: String,
        content: String,
        relevance: f32,
        kind: CodeEntryKind,
        /// `owner/repo`
        repository: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stars: Option<u32>,
        #[serde(default)]
        private: bool,
    },
    WebResult {
        title: String,
        content: String,
        relevance: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl RetrievedItem {
    pub fn title(&self) -> &str {
        match self {
            RetrievedItem::DocumentChunk { title, .. }
            | RetrievedItem::KnowledgeBaseEntry { title, .. }
            | RetrievedItem::CodeRepositoryEntry { title, .. }
            | RetrievedItem::WebResult { title, .. } => title,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            RetrievedItem::DocumentChunk { content, .. }
            | RetrievedItem::KnowledgeBaseEntry { content, .. }
            | RetrievedItem::CodeRepositoryEntry { content, .. }
            | RetrievedItem::WebResult { content, .. } => content,
        }
    }

    /// Relevance score, always within [0, 1]. NaN reads as 0.
    pub fn relevance(&self) -> f32 {
        let raw = match self {
            RetrievedItem::DocumentChunk { relevance, .. }
            | RetrievedItem::KnowledgeBaseEntry { relevance, .. }
            | RetrievedItem::CodeRepositoryEntry { relevance, .. }
            | RetrievedItem::WebResult { relevance, .. } => *relevance,
        };
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, 1.0)
        }
    }

    pub fn locator(&self) -> Option<Locator> {
        match self {
            RetrievedItem::DocumentChunk { page, .. } => page.map(Locator::Page),
            RetrievedItem::KnowledgeBaseEntry { url, .. } | RetrievedItem::WebResult { url, .. } => {
                url.clone().map(Locator::Url)
            }
            RetrievedItem::CodeRepositoryEntry {
                url, repository, ..
            } => Some(match url {
                Some(url) => Locator::Url(url.clone()),
                None => Locator::RepositoryPath(repository.clone()),
            }),
        }
    }

    /// Code entry kind, for code-repository entries only.
    pub fn code_kind(&self) -> Option<CodeEntryKind> {
        match self {
            RetrievedItem::CodeRepositoryEntry { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Repository metadata as reported by a code host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,

    /// `owner/repo`
    pub full_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub stars: u32,

    #[serde(default)]
    pub private: bool,

    pub url: String,
}

/// Truncate to at most `max_chars` characters, never splitting a UTF-8
/// sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
