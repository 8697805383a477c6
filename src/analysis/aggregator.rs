//! Result aggregation.
//!
//! Merges every checkpoint file in a directory into one list. A file that
//! cannot be read or parsed is logged and left out; it never fails the
//! whole merge.

use crate::checkpoint::write_json_pretty;
use crate::error::PipelineError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Records merged from a checkpoint directory.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Parsed records, in directory listing order.
    pub records: Vec<Value>,
    /// Files that were skipped because they could not be read or parsed.
    pub unreadable: Vec<PathBuf>,
}

/// Load every `.json` file directly inside `dir`.
///
/// A missing directory yields an empty aggregation.
pub fn load_all_records(dir: &Path) -> Aggregation {
    let mut aggregation = Aggregation::default();

    if !dir.is_dir() {
        return aggregation;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Cannot list entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if !entry.file_type().is_file() || !is_json {
            continue;
        }

        match read_record(path) {
            Ok(record) => aggregation.records.push(record),
            Err(e) => {
                warn!("Skipping checkpoint: {}", e);
                aggregation.unreadable.push(path.to_path_buf());
            }
        }
    }

    info!(
        "Loaded {} records from {} ({} unreadable)",
        aggregation.records.len(),
        dir.display(),
        aggregation.unreadable.len()
    );
    aggregation
}

fn read_record(path: &Path) -> Result<Value, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::persistence(path, e))?;
    serde_json::from_str(&content).map_err(|e| PipelineError::persistence(path, e))
}

/// Write the merged dataset as a pretty-printed JSON array.
pub fn write_final_output<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
    }
    write_json_pretty(path, records)?;
    info!("Saved {} records to '{}'", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let aggregation = load_all_records(&temp_dir.path().join("absent"));
        assert!(aggregation.records.is_empty());
        assert!(aggregation.unreadable.is_empty());
    }

    #[test]
    fn test_corrupted_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("q_0.json"), r#"{"video_id": "a"}"#).unwrap();
        fs::write(dir.join("q_1.json"), r#"{"video_id": "b"}"#).unwrap();
        fs::write(dir.join("q_2.json"), r#"{"video_id": "#).unwrap();

        let aggregation = load_all_records(dir);

        assert_eq!(aggregation.records.len(), 2);
        assert_eq!(aggregation.unreadable, vec![dir.join("q_2.json")]);
    }

    #[test]
    fn test_non_json_and_nested_entries_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("q_0.json"), r#"{"video_id": "a"}"#).unwrap();
        fs::write(dir.join("notes.txt"), "not a record").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("q_9.json"), r#"{"video_id": "z"}"#).unwrap();

        let aggregation = load_all_records(dir);

        assert_eq!(aggregation.records.len(), 1);
        assert_eq!(aggregation.records[0]["video_id"], "a");
        assert!(aggregation.unreadable.is_empty());
    }

    #[test]
    fn test_write_final_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("final.json");
        let records = vec![serde_json::json!({"video_id": "a"})];

        write_final_output(&path, &records).unwrap();

        let written: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, records);
    }
}
