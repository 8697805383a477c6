//! Search API clients.
//!
//! The collector only depends on the [`SearchClient`] trait; the YouTube
//! implementation lives in [`youtube`].

pub mod youtube;

pub use youtube::YouTubeClient;

use crate::error::PipelineError;
use crate::models::SearchPage;
use async_trait::async_trait;

/// Executes one page of a search query.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetch up to `max_results` hits for `query`, continuing from `page_token`.
    async fn search(
        &self,
        query: &str,
        page_token: Option<&str>,
        max_results: usize,
    ) -> Result<SearchPage, PipelineError>;

    /// Canonical locator for an item id.
    fn item_uri(&self, item_id: &str) -> String;
}
