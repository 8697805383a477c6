//! YouTube Data API v3 search client.

use super::SearchClient;
use crate::error::PipelineError;
use crate::models::{SearchHit, SearchPage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Settings for the YouTube client.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Search endpoint response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: ResultId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    description: String,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        SearchHit {
            id: result.id.video_id,
            title: result.snippet.title,
            published_at: result.snippet.published_at,
            description: result.snippet.description,
        }
    }
}

pub struct YouTubeClient {
    config: YouTubeConfig,
    http_client: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for search")?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl SearchClient for YouTubeClient {
    async fn search(
        &self,
        query: &str,
        page_token: Option<&str>,
        max_results: usize,
    ) -> Result<SearchPage, PipelineError> {
        let url = format!("{}/search", self.config.api_url.trim_end_matches('/'));
        let max_results = max_results.to_string();

        let mut params = vec![
            ("part", "snippet"),
            ("type", "video"),
            ("order", "relevance"),
            ("q", query),
            ("maxResults", max_results.as_str()),
            ("key", self.config.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        debug!("Search request for '{}' (page token: {:?})", query, page_token);

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Transport(format!(
                        "Search request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else {
                    PipelineError::Transport(format!("Failed to send search request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Transport(format!(
                "Search API error {}: {}",
                status, body
            )));
        }

        let parsed: SearchListResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Transport(format!("Failed to parse search response: {}", e)))?;

        Ok(SearchPage {
            items: parsed.items.into_iter().map(SearchHit::from).collect(),
            next_page_token: parsed.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn item_uri(&self, item_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "nextPageToken": "CAUQAA",
            "items": [
                {
                    "id": {"kind": "youtube#video", "videoId": "abc"},
                    "snippet": {
                        "title": "First",
                        "publishedAt": "2019-05-01T12:00:00Z",
                        "description": "desc"
                    }
                },
                {
                    "id": {"kind": "youtube#channel", "channelId": "chan"},
                    "snippet": {"title": "A channel"}
                }
            ]
        }"#;

        let parsed: SearchListResponse = serde_json::from_str(body).unwrap();
        let hits: Vec<SearchHit> = parsed.items.into_iter().map(SearchHit::from).collect();

        assert_eq!(parsed.next_page_token.as_deref(), Some("CAUQAA"));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id.as_deref(), Some("abc"));
        assert_eq!(hits[0].published_at, "2019-05-01T12:00:00Z");
        assert!(hits[1].id.is_none());
    }

    #[test]
    fn test_item_uri() {
        let client = YouTubeClient::new(YouTubeConfig {
            api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key: "key".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(
            client.item_uri("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
