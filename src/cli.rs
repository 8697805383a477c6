//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::AnalysisMode;
use clap::Parser;
use std::path::PathBuf;

/// VideoDigest - collect videos by search query and analyze them with Gemini
///
/// Runs three phases: collect candidates for every query, analyze each
/// video with a generative model, merge the per-video results into one
/// dataset. Safe to re-run: finished videos are skipped.
///
/// Examples:
///   videodigest --query "rustconf keynote" --query "rust async talk"
///   videodigest --config research.toml --mode concurrent --workers 2
///   videodigest --fresh --collect-only
///   videodigest --aggregate-only
///   videodigest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .videodigest.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the candidate cache, checkpoints, final dataset and log
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Search query (repeatable). Replaces the queries from the config file.
    #[arg(short = 'q', long = "query", value_name = "QUERY")]
    pub queries: Vec<String>,

    /// Maximum number of videos kept per query
    #[arg(long, value_name = "COUNT")]
    pub max_per_query: Option<usize>,

    /// Analysis scheduling mode
    #[arg(long, value_name = "MODE")]
    pub mode: Option<AnalysisMode>,

    /// Worker pool width in concurrent mode
    #[arg(long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Seconds a worker waits after each model call before taking the next video (concurrent mode)
    #[arg(long, value_name = "SECS")]
    pub delay: Option<u64>,

    /// Analysis request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Gemini model to use for analysis
    #[arg(short, long, env = "VIDEODIGEST_MODEL")]
    pub model: Option<String>,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_DATA_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Ignore the cached candidate list and search again
    #[arg(long)]
    pub fresh: bool,

    /// Stop after collecting candidates (no model calls)
    #[arg(long)]
    pub collect_only: bool,

    /// Only merge existing checkpoints into the final dataset
    #[arg(long)]
    pub aggregate_only: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(long)]
    pub quiet: bool,

    /// Generate a default .videodigest.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.workers == Some(0) {
            return Err("Workers must be at least 1".to_string());
        }

        if self.max_per_query == Some(0) {
            return Err("Max per query must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.queries.iter().any(|q| q.trim().is_empty()) {
            return Err("Queries must not be empty".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.collect_only && self.aggregate_only {
            return Err("Cannot use both --collect-only and --aggregate-only".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
