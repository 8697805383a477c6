//! Configuration file handling.
//!
//! This module handles loading `.videodigest.toml` files and merging
//! them with command-line arguments. The resulting [`Config`] is built once
//! in `main` and passed by reference to every phase.

use crate::models::AnalysisMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".videodigest.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output locations.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Model and scheduling settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root directory for every file the pipeline writes.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Cached candidate list, relative to `output_dir`.
    #[serde(default = "default_candidates_file")]
    pub candidates_file: String,

    /// Per-item checkpoint directory, relative to `output_dir`.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Merged dataset, relative to `output_dir`.
    #[serde(default = "default_final_output")]
    pub final_output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            candidates_file: default_candidates_file(),
            results_dir: default_results_dir(),
            final_output: default_final_output(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_candidates_file() -> String {
    "target_videos.json".to_string()
}

fn default_results_dir() -> String {
    "analysis_results".to_string()
}

fn default_final_output() -> String {
    "final_analysis_results.json".to_string()
}

/// Search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queries to run, one search per entry.
    #[serde(default)]
    pub queries: Vec<String>,

    /// Maximum unique videos kept per query.
    #[serde(default = "default_max_items_per_query")]
    pub max_items_per_query: usize,

    /// YouTube Data API base URL.
    #[serde(default = "default_search_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// API key. Usually supplied through `YOUTUBE_DATA_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            max_items_per_query: default_max_items_per_query(),
            api_url: default_search_api_url(),
            timeout_seconds: default_search_timeout(),
            api_key: None,
        }
    }
}

fn default_max_items_per_query() -> usize {
    5
}

fn default_search_api_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

/// Model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Gemini model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sequential (checkpointed) or concurrent (in-memory) scheduling.
    #[serde(default)]
    pub mode: AnalysisMode,

    /// Worker pool width for concurrent mode.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause after each completed item in concurrent mode.
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,

    /// Request timeout in seconds. Video analysis can take minutes.
    #[serde(default = "default_analysis_timeout")]
    pub timeout_seconds: u64,

    /// System prompt sent with every video.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Text file whose contents replace `prompt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,

    /// Gemini API base URL.
    #[serde(default = "default_analysis_api_url")]
    pub api_url: String,

    /// API key. Usually supplied through `GEMINI_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            mode: AnalysisMode::default(),
            workers: default_workers(),
            delay_seconds: default_delay_seconds(),
            timeout_seconds: default_analysis_timeout(),
            prompt: default_prompt(),
            prompt_file: None,
            api_url: default_analysis_api_url(),
            api_key: None,
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_delay_seconds() -> u64 {
    50
}

fn default_analysis_timeout() -> u64 {
    600
}

fn default_analysis_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

const DEFAULT_PROMPT: &str = r#"You are a media analyst. Watch the video and describe its narrative.
Respond with a single JSON object with these keys:
"summary" (string), "main_topics" (array of strings), "tone" (string),
"key_claims" (array of strings), "speakers" (array of strings).
Only output JSON."#;

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line (or through the environment)
    /// override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.to_string_lossy().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if !args.queries.is_empty() {
            self.search.queries = args.queries.clone();
        }
        if let Some(max) = args.max_per_query {
            self.search.max_items_per_query = max;
        }
        if let Some(ref key) = args.youtube_api_key {
            self.search.api_key = Some(key.clone());
        }

        if let Some(ref model) = args.model {
            self.analysis.model = model.clone();
        }
        if let Some(mode) = args.mode {
            self.analysis.mode = mode;
        }
        if let Some(workers) = args.workers {
            self.analysis.workers = workers;
        }
        if let Some(delay) = args.delay {
            self.analysis.delay_seconds = delay;
        }
        if let Some(timeout) = args.timeout {
            self.analysis.timeout_seconds = timeout;
        }
        if let Some(ref key) = args.gemini_api_key {
            self.analysis.api_key = Some(key.clone());
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.output_dir)
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.output_dir().join(&self.general.candidates_file)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.output_dir().join(&self.general.results_dir)
    }

    pub fn final_output_path(&self) -> PathBuf {
        self.output_dir().join(&self.general.final_output)
    }

    /// The system prompt, read from `prompt_file` when one is set.
    pub fn system_prompt(&self) -> Result<String> {
        match self.analysis.prompt_file {
            Some(ref file) => {
                let prompt = std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read prompt file: {}", file))?;
                Ok(prompt.trim().to_string())
            }
            None => Ok(self.analysis.prompt.clone()),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
