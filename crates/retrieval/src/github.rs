//! GitHub code-host adapter over the REST API.

use crate::adapter::CodeHost;
use crate::types::RepositorySummary;
use askflow_core::{AppError, AppResult};
use reqwest::StatusCode;
use serde::Deserialize;

const USER_AGENT: &str = concat!("askflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(default)]
    private: bool,
    html_url: String,
}

impl From<GitHubRepository> for RepositorySummary {
    fn from(repo: GitHubRepository) -> Self {
        Self {
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            language: repo.language,
            stars: repo.stargazers_count,
            private: repo.private,
            url: repo.html_url,
        }
    }
}

/// GitHub access on behalf of one authenticated user.
pub struct GitHubHost {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubHost {
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(token, Self::DEFAULT_API_URL)
    }

    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

async fn error_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}

#[async_trait::async_trait]
impl CodeHost for GitHubHost {
    fn name(&self) -> &str {
        "github"
    }

    async fn list_repositories(&self, limit: usize) -> AppResult<Vec<RepositorySummary>> {
        // GitHub caps per_page at 100
        let per_page = limit.clamp(1, 100);
        let response = self
            .get(&format!(
                "/user/repos?sort=updated&direction=desc&per_page={}",
                per_page
            ))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach GitHub: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Retrieval(format!(
                "GitHub API error ({}): {}",
                status,
                error_text(response).await
            )));
        }

        let repos: Vec<GitHubRepository> = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse GitHub repositories: {}", e)))?;

        tracing::debug!(count = repos.len(), "Listed GitHub repositories");

        Ok(repos.into_iter().take(limit).map(Into::into).collect())
    }

    async fn readme(&self, full_name: &str) -> AppResult<Option<String>> {
        let response = self
            .get(&format!("/repos/{}/readme", full_name))
            .header(reqwest::header::ACCEPT, "application/vnd.github.raw+json")
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach GitHub: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .text()
                .await
                .map(Some)
                .map_err(|e| AppError::Retrieval(format!("Failed to read README: {}", e))),
            status => Err(AppError::Retrieval(format!(
                "GitHub API error ({}) for {}: {}",
                status,
                full_name,
                error_text(response).await
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_conversion() {
        let raw = r#"{
            "name": "askflow",
            "full_name": "hoos/askflow",
            "description": null,
            "language": "Rust",
            "stargazers_count": 12,
            "private": true,
            "html_url": "https://github.com/hoos/askflow"
        }"#;
        let repo: GitHubRepository = serde_json::from_str(raw).unwrap();
        let summary: RepositorySummary = repo.into();

        assert_eq!(summary.full_name, "hoos/askflow");
        assert_eq!(summary.stars, 12);
        assert!(summary.private);
        assert!(summary.description.is_none());
    }

    #[test]
    fn test_api_url_is_normalized() {
        let host = GitHubHost::with_api_url("ghp_test", "https://github.example.edu/api/v3/");
        assert_eq!(host.api_url, "https://github.example.edu/api/v3");
        assert_eq!(host.name(), "github");
    }
}
