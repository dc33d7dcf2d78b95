//! JSONL-backed local corpora.
//!
//! Each line of the file is one entry:
//! `{"title": ..., "content": ..., "page": 3, "url": ..., "resource_type": ...}`.
//! Entries are embedded once at load time and ranked by cosine similarity
//! against the query.

use crate::adapter::RetrievalAdapter;
use crate::embedding::{cosine_similarity, TrigramEmbedder};
use crate::types::{truncate_chars, RetrievedItem};
use askflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Characters of content kept per returned snippet.
pub const DEFAULT_SNIPPET_CHARS: usize = 500;

/// Which source family a corpus feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusKind {
    /// Uploaded documents, yields document chunks
    Documents,

    /// Curated institutional resources, yields knowledge-base entries
    KnowledgeBase,
}

impl CorpusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusKind::Documents => "documents",
            CorpusKind::KnowledgeBase => "knowledge-base",
        }
    }

    /// Minimum similarity for a hit when none is configured.
    pub fn default_min_similarity(&self) -> f32 {
        match self {
            CorpusKind::Documents => 0.4,
            CorpusKind::KnowledgeBase => 0.2,
        }
    }
}

/// One line of a corpus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

/// In-memory corpus ranked with trigram embeddings.
pub struct JsonlCorpus {
    kind: CorpusKind,
    name: String,
    entries: Vec<(CorpusRecord, Vec<f32>)>,
    embedder: TrigramEmbedder,
    min_similarity: f32,
    snippet_chars: usize,
}

impl JsonlCorpus {
    /// Load a corpus from a JSONL file.
    pub fn open(path: &Path, kind: CorpusKind) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to open corpus {:?}: {}", path, e))
        })?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::Retrieval(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: CorpusRecord = serde_json::from_str(&line).map_err(|e| {
                AppError::Retrieval(format!(
                    "Failed to parse line {} in {:?}: {}",
                    line_num + 1,
                    path,
                    e
                ))
            })?;

            records.push(record);
        }

        tracing::info!(
            kind = kind.as_str(),
            entries = records.len(),
            "Loaded corpus from {:?}",
            path
        );

        Ok(Self::from_records(kind, records))
    }

    /// Build a corpus from records already in memory.
    pub fn from_records(kind: CorpusKind, records: Vec<CorpusRecord>) -> Self {
        let embedder = TrigramEmbedder::default();
        let entries = records
            .into_iter()
            .map(|record| {
                let embedding = embedder.embed(&format!("{} {}", record.title, record.content));
                (record, embedding)
            })
            .collect();

        Self {
            kind,
            name: kind.as_str().to_string(),
            entries,
            embedder,
            min_similarity: kind.default_min_similarity(),
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_item(&self, record: &CorpusRecord, similarity: f32) -> RetrievedItem {
        let content = truncate_chars(&record.content, self.snippet_chars);
        match self.kind {
            CorpusKind::Documents => RetrievedItem::DocumentChunk {
                title: record.title.clone(),
                content,
                relevance: similarity,
                page: record.page,
            },
            CorpusKind::KnowledgeBase => RetrievedItem::KnowledgeBaseEntry {
                title: record.title.clone(),
                content,
                relevance: similarity,
                url: record.url.clone(),
                resource_type: record.resource_type.clone(),
            },
        }
    }
}

#[async_trait::async_trait]
impl RetrievalAdapter for JsonlCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<RetrievedItem>> {
        let query_embedding = self.embedder.embed(query);

        let mut scored: Vec<(&CorpusRecord, f32)> = self
            .entries
            .iter()
            .map(|(record, embedding)| (record, cosine_similarity(&query_embedding, embedding)))
            .filter(|(_, similarity)| *similarity >= self.min_similarity)
            .collect();

        // Stable sort keeps file order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_results);

        tracing::debug!(
            corpus = %self.name,
            hits = scored.len(),
            "Corpus search complete"
        );

        Ok(scored
            .into_iter()
            .map(|(record, similarity)| self.to_item(record, similarity))
            .collect())
    }
}
