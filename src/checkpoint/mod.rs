//! Durable checkpoints.
//!
//! Each analyzed item is written to its own pretty-printed JSON file named
//! `{query}_{index_in_query}.json`. The set of names present when a run
//! starts decides which items that run skips. The candidate list from the
//! collection phase is cached next to the results so a re-run can skip
//! searching.

use crate::error::PipelineError;
use crate::models::{AnalysisRecord, CandidateItem};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the checkpoint for `item`.
pub fn checkpoint_filename(item: &CandidateItem) -> String {
    format!("{}.json", item.checkpoint_key())
}

/// A directory of per-item checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the checkpoint directory if needed.
    pub fn ensure_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|e| PipelineError::persistence(&self.dir, e))
    }

    /// Names of all files currently in the directory.
    ///
    /// Taken once per run; writes made later in the run are not reflected.
    pub fn snapshot(&self) -> Result<HashSet<String>, PipelineError> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| PipelineError::persistence(&self.dir, e))?;

        let names: HashSet<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();

        debug!(
            "Checkpoint snapshot of {}: {} files",
            self.dir.display(),
            names.len()
        );
        Ok(names)
    }

    /// Write the record for `item`, replacing any existing file.
    pub fn persist(
        &self,
        item: &CandidateItem,
        record: &AnalysisRecord,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.dir.join(checkpoint_filename(item));
        write_json_pretty(&path, record)?;
        Ok(path)
    }
}

/// Serialize `value` as indented JSON and write it to `path`.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| PipelineError::persistence(path, e))?;
    fs::write(path, content).map_err(|e| PipelineError::persistence(path, e))
}

/// Save the collected candidate list.
pub fn save_candidates(path: &Path, items: &[CandidateItem]) -> Result<(), PipelineError> {
    write_json_pretty(path, items)?;
    info!("Saved {} candidates to '{}'", items.len(), path.display());
    Ok(())
}

/// Load a previously saved candidate list.
///
/// Returns `None` when the file is missing, unreadable, empty, or not an
/// array of objects that all parse as candidates. Any of those means the
/// caller should collect again.
pub fn load_cached_candidates(path: &Path) -> Option<Vec<CandidateItem>> {
    if !path.exists() {
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read candidate cache {}: {}", path.display(), e);
            return None;
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Candidate cache {} is not valid JSON: {}", path.display(), e);
            return None;
        }
    };

    let first_is_object = value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(Value::is_object);
    if !first_is_object {
        warn!("Old data format detected in {}. Re-collecting.", path.display());
        return None;
    }

    match serde_json::from_value::<Vec<CandidateItem>>(value) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!(
                "Candidate cache {} has unexpected entries ({}). Re-collecting.",
                path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_item(query: &str, index: usize) -> CandidateItem {
        CandidateItem {
            query: query.to_string(),
            item_id: format!("id-{}", index),
            uri: format!("https://www.youtube.com/watch?v=id-{}", index),
            title: "Título con acentos".to_string(),
            publish_date: "2020-02-02T00:00:00Z".to_string(),
            description: "line one\nline two".to_string(),
            index_in_query: index,
        }
    }

    #[test]
    fn test_checkpoint_filename() {
        assert_eq!(
            checkpoint_filename(&make_item("campus tour 2019", 2)),
            "campus_tour_2019_2.json"
        );
    }

    #[test]
    fn test_persist_and_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("results"));
        store.ensure_dir().unwrap();
        assert!(store.snapshot().unwrap().is_empty());

        let item = make_item("q one", 0);
        let record = item.merge_analysis(serde_json::Map::new());
        let path = store.persist(&item, &record).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"query\": \"q one\""));
        assert!(store.snapshot().unwrap().contains("q_one_0.json"));
    }

    #[test]
    fn test_candidate_cache_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target_videos.json");
        let items = vec![make_item("a", 0), make_item("b", 1)];

        save_candidates(&path, &items).unwrap();
        let loaded = load_cached_candidates(&path).unwrap();
        assert_eq!(loaded, items);
    }

    #[test]
    fn test_candidate_cache_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_cached_candidates(&temp_dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_candidate_cache_rejects_old_shapes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target_videos.json");

        fs::write(&path, "[]").unwrap();
        assert!(load_cached_candidates(&path).is_none());

        fs::write(&path, r#"["https://www.youtube.com/watch?v=a"]"#).unwrap();
        assert!(load_cached_candidates(&path).is_none());

        fs::write(&path, r#"{"query": "q"}"#).unwrap();
        assert!(load_cached_candidates(&path).is_none());

        fs::write(&path, "not json").unwrap();
        assert!(load_cached_candidates(&path).is_none());
    }

    #[test]
    fn test_candidate_cache_keeps_items_without_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target_videos.json");
        let content = json!([
            {"query": "q", "video_id": "a", "url": "u", "index_in_query": 0},
            {"query": "q", "index_in_query": 1}
        ]);
        fs::write(&path, content.to_string()).unwrap();

        let loaded = load_cached_candidates(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[1].item_id.is_empty());
    }
}
