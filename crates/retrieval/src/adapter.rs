//! Adapter traits at the retrieval boundary.
//!
//! Adapters are long-lived, shared handles (`Arc<dyn RetrievalAdapter>`);
//! they must not keep per-request state.

use crate::types::{RepositorySummary, RetrievedItem};
use askflow_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// A ranked search over one source family.
#[async_trait::async_trait]
pub trait RetrievalAdapter: Send + Sync {
    /// Adapter name used in logs and trace payloads.
    fn name(&self) -> &str;

    /// Search for up to `max_results` items, best first.
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<RetrievedItem>>;
}

/// A code-hosting integration (repository listing and README access).
#[async_trait::async_trait]
pub trait CodeHost: Send + Sync {
    fn name(&self) -> &str;

    /// Repositories of the authenticated user, most recently updated first.
    async fn list_repositories(&self, limit: usize) -> AppResult<Vec<RepositorySummary>>;

    /// Raw README of `owner/repo`, `None` when the repository has none.
    async fn readme(&self, full_name: &str) -> AppResult<Option<String>>;
}

/// Run `fut` with a deadline. Expiry becomes [`AppError::Timeout`].
///
/// # Example
/// ```no_run
/// use askflow_retrieval::{with_deadline, RetrievalAdapter};
/// use std::time::Duration;
///
/// # async fn example(adapter: &dyn RetrievalAdapter) -> askflow_core::AppResult<()> {
/// let items = with_deadline("web search", Duration::from_secs(30), adapter.search("vpn", 5)).await?;
/// println!("{} results", items.len());
/// # Ok(())
/// # }
/// ```
pub async fn with_deadline<T, F>(operation: &str, after: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, secs = after.as_secs_f64(), "Call exceeded deadline");
            Err(AppError::timeout(operation, after))
        }
    }
}

/// Stand-in for a source that has not been configured. Every call fails
/// with a configuration error so the caller records why nothing was found.
#[derive(Debug, Clone)]
pub struct UnconfiguredAdapter {
    name: String,
    hint: String,
}

impl UnconfiguredAdapter {
    pub fn new(name: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: hint.into(),
        }
    }

    fn error(&self) -> AppError {
        AppError::Config(format!("{} is not configured: {}", self.name, self.hint))
    }
}

#[async_trait::async_trait]
impl RetrievalAdapter for UnconfiguredAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, _max_results: usize) -> AppResult<Vec<RetrievedItem>> {
        Err(self.error())
    }
}
