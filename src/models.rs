//! Data models for the pipeline.
//!
//! This module contains the records that flow between phases: the
//! candidate items produced by collection, the raw search pages returned by
//! a search client, and the summary of an analysis run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields produced by the analysis model for one item.
///
/// The shape is set by the prompt, so it is kept as an opaque JSON object.
pub type AnalysisFields = Map<String, Value>;

/// A candidate item merged with its analysis fields.
pub type AnalysisRecord = Map<String, Value>;

/// One discovered video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Search query that surfaced the item.
    pub query: String,
    /// Platform identifier, the collection dedup key. Empty means malformed.
    #[serde(rename = "video_id", alias = "item_id", default)]
    pub item_id: String,
    /// Resource locator handed to the analysis client.
    #[serde(rename = "url", alias = "uri", default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publish_date: String,
    #[serde(default)]
    pub description: String,
    /// 0-based rank among the new items of the originating query.
    pub index_in_query: usize,
}

impl CandidateItem {
    /// Checkpoint key: the query with whitespace replaced, then the rank.
    pub fn checkpoint_key(&self) -> String {
        let query: String = self
            .query
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("{}_{}", query, self.index_in_query)
    }

    /// Merge analysis fields on top of this item's metadata.
    ///
    /// Analysis fields are applied last, so a field with the same name as a
    /// metadata field replaces it.
    pub fn merge_analysis(&self, fields: AnalysisFields) -> AnalysisRecord {
        let mut record = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        record.extend(fields);
        record
    }
}

/// A single hit returned by the search API.
#[derive(Debug, Clone, Default)]
pub struct SearchHit {
    /// `None` when the API returned a hit without a video id.
    pub id: Option<String>,
    pub title: String,
    pub published_at: String,
    pub description: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<SearchHit>,
    pub next_page_token: Option<String>,
}

/// How the analysis phase schedules model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// One item at a time, each result checkpointed to its own file.
    #[default]
    Sequential,
    /// Bounded worker pool, results kept in memory.
    Concurrent,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Sequential => write!(f, "sequential"),
            AnalysisMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Counters for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    /// Items analyzed successfully. Written to disk only in sequential mode.
    pub persisted: usize,
    pub skipped_existing: usize,
    pub skipped_malformed: usize,
    pub dropped: usize,
    /// Items never attempted because the run was aborted.
    pub not_attempted: usize,
    /// Concurrent mode only: tasks still outstanding when the run was
    /// aborted. Some may have been calling the model; their results are ignored.
    #[serde(default)]
    pub discarded: usize,
    /// Whether a rate limit ended the run early.
    pub aborted: bool,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total,
            persisted: 0,
            skipped_existing: 0,
            skipped_malformed: 0,
            dropped: 0,
            not_attempted: 0,
            discarded: 0,
            aborted: false,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} analyzed, {} already done, {} malformed, {} failed, {} not attempted",
            self.total,
            self.persisted,
            self.skipped_existing,
            self.skipped_malformed,
            self.dropped,
            self.not_attempted
        )?;
        if self.discarded > 0 {
            write!(f, ", {} discarded", self.discarded)?;
        }
        if self.aborted {
            write!(f, " (stopped by rate limit)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_item() -> CandidateItem {
        CandidateItem {
            query: "rust  async\tbook".to_string(),
            item_id: "abc123".to_string(),
            uri: "https://www.youtube.com/watch?v=abc123".to_string(),
            title: "Async Rust".to_string(),
            publish_date: "2024-01-01T00:00:00Z".to_string(),
            description: "A talk".to_string(),
            index_in_query: 3,
        }
    }

    #[test]
    fn test_checkpoint_key_replaces_whitespace() {
        assert_eq!(make_item().checkpoint_key(), "rust__async_book_3");
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(make_item()).unwrap();
        assert_eq!(value["video_id"], "abc123");
        assert_eq!(value["url"], "https://www.youtube.com/watch?v=abc123");
        assert_eq!(value["index_in_query"], 3);
    }

    #[test]
    fn test_deserialize_accepts_aliases_and_missing_id() {
        let item: CandidateItem = serde_json::from_value(json!({
            "query": "q",
            "item_id": "x",
            "uri": "u",
            "index_in_query": 0
        }))
        .unwrap();
        assert_eq!(item.item_id, "x");
        assert_eq!(item.uri, "u");

        let item: CandidateItem =
            serde_json::from_value(json!({"query": "q", "index_in_query": 1})).unwrap();
        assert!(item.item_id.is_empty());
    }

    #[test]
    fn test_merge_analysis_applies_fields_on_top() {
        let mut fields = AnalysisFields::new();
        fields.insert("stance".to_string(), json!("neutral"));
        fields.insert("title".to_string(), json!("Model title"));

        let record = make_item().merge_analysis(fields);
        assert_eq!(record["stance"], "neutral");
        assert_eq!(record["title"], "Model title");
        assert_eq!(record["video_id"], "abc123");
    }

    #[test]
    fn test_run_summary_display() {
        let mut summary = RunSummary::new(5);
        summary.persisted = 2;
        summary.not_attempted = 2;
        summary.aborted = true;
        let text = summary.to_string();
        assert!(text.starts_with("5 items: 2 analyzed"));
        assert!(text.ends_with("(stopped by rate limit)"));
        assert!(!text.contains("discarded"));

        summary.discarded = 1;
        assert!(summary.to_string().contains("2 not attempted, 1 discarded"));
    }
}
