//! Error taxonomy for the pipeline.
//!
//! Every failure the pipeline can observe falls into one of four buckets.
//! Only [`PipelineError::RateLimit`] changes control flow beyond the item or
//! query it happened on: it ends the analysis phase for the current run.

use std::path::PathBuf;
use thiserror::Error;

/// Markers in an API failure body that mean the quota is exhausted.
const RATE_LIMIT_MARKERS: &[&str] = &["RESOURCE_EXHAUSTED"];

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or API failure. Logged and skipped at item or query granularity.
    #[error("transport error: {0}")]
    Transport(String),

    /// The analysis service reported quota exhaustion.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// An input record is missing a required identifier.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A checkpoint or output file could not be read or written.
    #[error("persistence error at {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },
}

impl PipelineError {
    /// Classify a non-success API response.
    ///
    /// HTTP 429 is always a rate limit. Some services report exhaustion with
    /// a different status and a `RESOURCE_EXHAUSTED` status string in the body,
    /// so the body is inspected as well.
    pub fn classify_api_failure(status: u16, body: &str) -> Self {
        let message = format!("API error {}: {}", status, body);
        if status == 429 || RATE_LIMIT_MARKERS.iter().any(|m| body.contains(m)) {
            PipelineError::RateLimit(message)
        } else {
            PipelineError::Transport(message)
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, PipelineError::RateLimit(_))
    }
}
