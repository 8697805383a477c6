//! VideoDigest - search-driven video collection and AI analysis
//!
//! Collects videos for a list of search queries, sends each one to a
//! Gemini model for narrative analysis, and merges the per-video results
//! into a single JSON dataset. Each finished video is checkpointed, so an
//! interrupted or rate-limited run can simply be started again.
//!
//! Exit codes:
//!   0 - Success (including "no videos found")
//!   1 - Configuration, argument, or output directory error

mod analysis;
mod checkpoint;
mod cli;
mod collector;
mod config;
mod error;
mod llm;
mod models;
mod search;

use analysis::{load_all_records, write_final_output, AnalysisRunner, AnalysisSettings};
use anyhow::{anyhow, Context, Result};
use checkpoint::{load_cached_candidates, save_candidates, CheckpointStore};
use cli::Args;
use collector::Collector;
use config::Config;
use llm::gemini::GeminiConfig;
use llm::GeminiClient;
use models::{AnalysisMode, CandidateItem, RunSummary};
use search::youtube::YouTubeConfig;
use search::YouTubeClient;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Log file written inside the output directory on every run.
const LOG_FILE: &str = "pipeline.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    let output_dir = config.output_dir();
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!(
            "Error: cannot create output directory {}: {}",
            output_dir.display(),
            e
        );
        std::process::exit(1);
    }

    init_logging(&args, &config, &output_dir.join(LOG_FILE));

    info!("VideoDigest v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", source);
    info!("Output directory: {}", output_dir.display());
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_pipeline(&args, &config).await {
        error!("Pipeline failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .videodigest.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Add your search queries under [search] and adjust the prompt under [analysis].");
    Ok(())
}

/// Initialize logging to the console and to the run's log file.
fn init_logging(args: &Args, config: &Config, log_path: &Path) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let log_file = match File::create(log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("⚠️  Cannot create log file {}: {}", log_path.display(), e);
            None
        }
    };
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
    });

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
///
/// Returns the configuration and a description of where it came from.
fn load_config(args: &Args) -> Result<(Config, String)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    match Config::load_default()? {
        Some(config) => Ok((config, config::CONFIG_FILE.to_string())),
        None => Ok((Config::default(), "defaults".to_string())),
    }
}

/// Run collection, analysis and aggregation.
async fn run_pipeline(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();
    let store = CheckpointStore::new(config.results_dir());

    if args.aggregate_only {
        println!("📦 Merging existing results...");
        let count = finalize_from_checkpoints(config, &store)?;
        println!(
            "\n✅ Merged {} records into {}",
            count,
            config.final_output_path().display()
        );
        return Ok(());
    }

    // Phase 1: collection
    println!("🔎 Phase 1: collecting candidates");
    let candidates = load_or_collect(args, config).await?;

    if candidates.is_empty() {
        error!("No videos found. Exiting.");
        println!("\n⚠️  No videos found. Nothing to analyze.");
        return Ok(());
    }

    if args.collect_only {
        println!(
            "\n✅ Collected {} videos. Saved to {}",
            candidates.len(),
            config.candidates_path().display()
        );
        return Ok(());
    }

    // Phase 2: analysis
    println!("\n🤖 Phase 2: analyzing {} videos", candidates.len());
    println!("   Model: {}", config.analysis.model);
    println!("   Mode: {}", config.analysis.mode);

    let runner = build_runner(args, config)?;

    let (summary, record_count) = match config.analysis.mode {
        AnalysisMode::Sequential => {
            let summary = runner.run_sequential(&candidates, &store).await?;

            // Phase 3: merge checkpoints
            println!("\n📦 Phase 3: merging results");
            let count = finalize_from_checkpoints(config, &store)?;
            (summary, count)
        }
        AnalysisMode::Concurrent => {
            let (records, summary) = runner.run_concurrent(candidates).await;

            println!("\n📦 Phase 3: writing results");
            write_final_output(&config.final_output_path(), &records)?;
            (summary, records.len())
        }
    };

    print_summary(&summary, record_count, config, start_time.elapsed());
    Ok(())
}

/// Phase 1: reuse the cached candidate list, or search again.
async fn load_or_collect(args: &Args, config: &Config) -> Result<Vec<CandidateItem>> {
    let cache_path = config.candidates_path();

    if args.fresh {
        info!("Ignoring cached candidate list (--fresh)");
    } else if let Some(items) = load_cached_candidates(&cache_path) {
        info!(
            "Found existing list with {} videos in {}",
            items.len(),
            cache_path.display()
        );
        return Ok(items);
    }

    info!("Starting fresh collection...");

    if config.search.queries.is_empty() {
        return Err(anyhow!(
            "No search queries configured. Use --query or add queries under [search] in {}",
            config::CONFIG_FILE
        ));
    }

    let api_key = config
        .search
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow!("YouTube API key missing. Set YOUTUBE_DATA_API_KEY"))?;

    let client = YouTubeClient::new(YouTubeConfig {
        api_url: config.search.api_url.clone(),
        api_key,
        timeout_seconds: config.search.timeout_seconds,
    })?;

    let collector = Collector::new(&client, config.search.max_items_per_query);
    let items = collector.run(&config.search.queries).await;

    if let Err(e) = save_candidates(&cache_path, &items) {
        warn!("Could not cache candidate list: {}", e);
    }

    Ok(items)
}

fn build_runner(args: &Args, config: &Config) -> Result<AnalysisRunner> {
    let api_key = config
        .analysis
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow!("Gemini API key missing. Set GEMINI_API_KEY"))?;

    let client = GeminiClient::new(GeminiConfig {
        api_url: config.analysis.api_url.clone(),
        api_key,
        model: config.analysis.model.clone(),
        timeout_seconds: config.analysis.timeout_seconds,
    })?;

    let settings = AnalysisSettings {
        system_prompt: config.system_prompt()?,
        workers: config.analysis.workers,
        delay: Duration::from_secs(config.analysis.delay_seconds),
        show_progress: !args.quiet,
    };

    Ok(AnalysisRunner::new(Arc::new(client), settings))
}

/// Phase 3: merge every checkpoint into the final dataset.
fn finalize_from_checkpoints(config: &Config, store: &CheckpointStore) -> Result<usize> {
    let aggregation = load_all_records(store.dir());
    if !aggregation.unreadable.is_empty() {
        warn!(
            "{} checkpoint files could not be read and were left out",
            aggregation.unreadable.len()
        );
    }

    write_final_output(&config.final_output_path(), &aggregation.records)?;
    info!("Loaded {} JSON records.", aggregation.records.len());
    Ok(aggregation.records.len())
}

fn print_summary(summary: &RunSummary, record_count: usize, config: &Config, elapsed: Duration) {
    info!("Run summary: {}", summary);

    println!("\n📊 Analysis Summary:");
    println!(
        "   Started: {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("   Videos: {}", summary.total);
    println!(
        "   Analyzed: {} | Already done: {} | Failed: {} | Malformed: {}",
        summary.persisted, summary.skipped_existing, summary.dropped, summary.skipped_malformed
    );
    if summary.aborted {
        println!(
            "   ⛔ Stopped by rate limit. {} videos not attempted; re-run later to continue.",
            summary.not_attempted
        );
        if summary.discarded > 0 {
            println!(
                "   {} videos were queued or in flight at the stop; their results were discarded.",
                summary.discarded
            );
        }
    }
    println!("   Duration: {:.1}s", elapsed.as_secs_f64());
    println!(
        "\n✅ Done! {} records saved to: {}",
        record_count,
        config.final_output_path().display()
    );
}
