//! Candidate collection.
//!
//! Runs one paginated search per query, all queries concurrently, and
//! merges the results into a single list keyed by item id. Results are
//! merged one query at a time as each search completes, so no lock guards
//! the merged set.

use crate::error::PipelineError;
use crate::models::CandidateItem;
use crate::search::SearchClient;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Largest page the search API will return.
pub const MAX_PAGE_SIZE: usize = 50;

pub struct Collector<'a> {
    client: &'a dyn SearchClient,
    max_items_per_query: usize,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a dyn SearchClient, max_items_per_query: usize) -> Self {
        Self {
            client,
            max_items_per_query,
        }
    }

    /// Collect candidates for all queries.
    ///
    /// Never fails: a query whose search errors contributes nothing. When two
    /// queries surface the same item id, the query that finished first keeps it.
    pub async fn run(&self, queries: &[String]) -> Vec<CandidateItem> {
        info!("Collecting candidates for {} queries", queries.len());

        let mut pending: FuturesUnordered<_> =
            queries.iter().map(|q| self.collect_query(q)).collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<CandidateItem> = Vec::new();

        while let Some(items) = pending.next().await {
            for item in items {
                if seen.insert(item.item_id.clone()) {
                    merged.push(item);
                } else {
                    debug!(
                        "Item {} from '{}' already collected by another query",
                        item.item_id, item.query
                    );
                }
            }
        }

        info!("Collected {} unique candidates", merged.len());
        merged
    }

    /// Collect one query, logging and swallowing any search failure.
    pub async fn collect_query(&self, query: &str) -> Vec<CandidateItem> {
        match self.search_query(query).await {
            Ok(items) => {
                info!("Finished '{}': found {} videos", query, items.len());
                items
            }
            Err(e) => {
                error!("Error searching '{}': {}", query, e);
                Vec::new()
            }
        }
    }

    /// Paginate one query until the per-query maximum or the last page.
    ///
    /// Duplicate ids across pages are dropped; `index_in_query` counts only
    /// newly seen items, in first-seen order.
    pub async fn search_query(&self, query: &str) -> Result<Vec<CandidateItem>, PipelineError> {
        info!("Searching for '{}'", query);

        let target = self.max_items_per_query;
        let mut items: Vec<CandidateItem> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut page_token: Option<String> = None;

        while items.len() < target {
            let fetch_count = MAX_PAGE_SIZE.min(target - items.len());
            let page = self
                .client
                .search(query, page_token.as_deref(), fetch_count)
                .await?;

            if page.items.is_empty() {
                break;
            }

            for hit in page.items {
                let Some(id) = hit.id.filter(|id| !id.is_empty()) else {
                    warn!("Skipping search hit without a video id for '{}'", query);
                    continue;
                };
                if !seen_ids.insert(id.clone()) {
                    continue;
                }

                let index_in_query = items.len();
                items.push(CandidateItem {
                    query: query.to_string(),
                    uri: self.client.item_uri(&id),
                    item_id: id,
                    title: hit.title,
                    publish_date: hit.published_at,
                    description: hit.description,
                    index_in_query,
                });

                if items.len() >= target {
                    break;
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchHit, SearchPage};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted search results. Page tokens are `page-N`.
    #[derive(Default)]
    struct FakeSearch {
        pages: HashMap<String, Vec<Vec<&'static str>>>,
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        requests: Mutex<Vec<(String, usize)>>,
    }

    impl FakeSearch {
        fn with_pages(mut self, query: &str, pages: Vec<Vec<&'static str>>) -> Self {
            self.pages.insert(query.to_string(), pages);
            self
        }

        fn with_delay(mut self, query: &str, millis: u64) -> Self {
            self.delays
                .insert(query.to_string(), Duration::from_millis(millis));
            self
        }

        fn failing(mut self, query: &str) -> Self {
            self.failing.insert(query.to_string());
            self
        }
    }

    #[async_trait]
    impl SearchClient for FakeSearch {
        async fn search(
            &self,
            query: &str,
            page_token: Option<&str>,
            max_results: usize,
        ) -> Result<SearchPage, PipelineError> {
            self.requests
                .lock()
                .unwrap()
                .push((query.to_string(), max_results));

            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(query) {
                return Err(PipelineError::Transport("quota exceeded".to_string()));
            }

            let index: usize = page_token
                .and_then(|t| t.strip_prefix("page-"))
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let pages = self.pages.get(query).cloned().unwrap_or_default();
            let items = pages
                .get(index)
                .map(|ids| {
                    ids.iter()
                        .map(|id| SearchHit {
                            id: Some(id.to_string()),
                            title: format!("Title {}", id),
                            published_at: "2023-01-01T00:00:00Z".to_string(),
                            description: String::new(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let next_page_token = if index + 1 < pages.len() {
                Some(format!("page-{}", index + 1))
            } else {
                None
            };

            Ok(SearchPage {
                items,
                next_page_token,
            })
        }

        fn item_uri(&self, item_id: &str) -> String {
            format!("https://videos.test/{}", item_id)
        }
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_are_suppressed() {
        let client = FakeSearch::default().with_pages(
            "q",
            vec![vec!["a", "b", "c"], vec!["b", "d", "a"], vec!["e"]],
        );
        let collector = Collector::new(&client, 10);

        let items = collector.search_query("q").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        let ranks: Vec<_> = items.iter().map(|i| i.index_in_query).collect();

        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
        assert_eq!(items[3].uri, "https://videos.test/d");
    }

    #[tokio::test]
    async fn test_stops_at_per_query_maximum() {
        let client = FakeSearch::default()
            .with_pages("q", vec![vec!["a", "b"], vec!["c", "d"], vec!["e", "f"]]);
        let collector = Collector::new(&client, 3);

        let items = collector.search_query("q").await.unwrap();
        assert_eq!(items.len(), 3);

        let requests = client.requests.lock().unwrap().clone();
        assert_eq!(requests, vec![("q".to_string(), 3), ("q".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_page_size_capped_at_api_ceiling() {
        let client = FakeSearch::default().with_pages("q", vec![vec!["a"]]);
        let collector = Collector::new(&client, 120);

        collector.search_query("q").await.unwrap();
        let requests = client.requests.lock().unwrap().clone();
        assert_eq!(requests, vec![("q".to_string(), MAX_PAGE_SIZE)]);
    }

    #[tokio::test]
    async fn test_overlapping_queries_first_finisher_wins() {
        let client = FakeSearch::default()
            .with_pages("slow", vec![vec!["shared", "s1"]])
            .with_delay("slow", 200)
            .with_pages("fast", vec![vec!["f1", "shared"]]);
        let collector = Collector::new(&client, 5);

        let queries = vec!["slow".to_string(), "fast".to_string()];
        let items = collector.run(&queries).await;

        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "shared", "s1"]);

        let shared = items.iter().find(|i| i.item_id == "shared").unwrap();
        assert_eq!(shared.query, "fast");
        assert_eq!(shared.index_in_query, 1);
    }

    #[tokio::test]
    async fn test_failing_query_does_not_abort_siblings() {
        let client = FakeSearch::default()
            .with_pages("good", vec![vec!["a", "b"]])
            .failing("bad");
        let collector = Collector::new(&client, 5);

        let queries = vec!["bad".to_string(), "good".to_string()];
        let items = collector.run(&queries).await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.query == "good"));
    }

    #[tokio::test]
    async fn test_all_queries_failing_yields_empty() {
        let client = FakeSearch::default().failing("a").failing("b");
        let collector = Collector::new(&client, 5);

        let items = collector.run(&["a".to_string(), "b".to_string()]).await;
        assert!(items.is_empty());
    }
}
