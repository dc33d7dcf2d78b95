//! Tavily web-search adapter.
//!
//! Tavily API: https://docs.tavily.com/documentation/api-reference/endpoint/search

use crate::adapter::RetrievalAdapter;
use crate::types::RetrievedItem;
use askflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Web search through the Tavily API.
pub struct TavilySearch {
    base_url: String,
    api_key: String,
    search_depth: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub const DEFAULT_URL: &'static str = "https://api.tavily.com";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_URL.to_string(),
            api_key: api_key.into(),
            search_depth: "advanced".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// "basic" or "advanced".
    pub fn with_search_depth(mut self, search_depth: impl Into<String>) -> Self {
        self.search_depth = search_depth.into();
        self
    }

    /// Tavily's own summary, when present, leads the list at relevance 1.0.
    fn convert_response(response: TavilyResponse) -> Vec<RetrievedItem> {
        let mut items = Vec::with_capacity(response.results.len() + 1);

        if let Some(answer) = response.answer.filter(|a| !a.trim().is_empty()) {
            items.push(RetrievedItem::WebResult {
                title: "AI Summary".to_string(),
                content: answer,
                relevance: 1.0,
                url: None,
            });
        }

        items.extend(response.results.into_iter().map(|r| RetrievedItem::WebResult {
            title: r.title,
            content: r.content,
            relevance: r.score,
            url: Some(r.url).filter(|u| !u.is_empty()),
        }));

        items
    }
}

#[async_trait::async_trait]
impl RetrievalAdapter for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<RetrievedItem>> {
        tracing::debug!(max_results, "Sending search request to Tavily");

        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: &self.search_depth,
            include_answer: true,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to send request to Tavily: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Tavily API error ({}): {}",
                status, error_text
            )));
        }

        let tavily_response: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse Tavily response: {}", e)))?;

        let items = Self::convert_response(tavily_response);
        tracing::info!(results = items.len(), "Tavily search complete");
        Ok(items)
    }
}
