//! Analysis orchestration.
//!
//! Two modes:
//! - Sequential: one item at a time, each result written to its own
//!   checkpoint file before the next item starts. A rate limit stops the
//!   loop right there, so every earlier success is already on disk.
//! - Concurrent: a bounded pool of tasks, results kept in memory. A rate
//!   limit raises a shared abort flag; tasks that have not started yet see
//!   it and return without calling the model. Each task keeps its pool
//!   slot for the configured delay after its call, so the delay spaces out
//!   the calls themselves.

use crate::checkpoint::{checkpoint_filename, CheckpointStore};
use crate::error::PipelineError;
use crate::llm::AnalysisClient;
use crate::models::{AnalysisRecord, CandidateItem, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Settings shared by both modes.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// System prompt sent with every item.
    pub system_prompt: String,
    /// Pool width in concurrent mode.
    pub workers: usize,
    /// Pause after each model call before its pool slot frees up, in
    /// concurrent mode.
    pub delay: Duration,
    /// Draw a progress bar in sequential mode.
    pub show_progress: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            workers: 4,
            delay: Duration::from_secs(50),
            show_progress: false,
        }
    }
}

/// Result of one task in concurrent mode.
enum TaskOutcome {
    Analyzed(AnalysisRecord),
    Dropped,
    RateLimited,
    /// Never called the model because the run was already aborting.
    Cancelled,
}

pub struct AnalysisRunner {
    client: Arc<dyn AnalysisClient>,
    settings: AnalysisSettings,
}

impl AnalysisRunner {
    pub fn new(client: Arc<dyn AnalysisClient>, settings: AnalysisSettings) -> Self {
        Self { client, settings }
    }

    /// Analyze `items` one at a time, checkpointing each success.
    ///
    /// Items whose checkpoint file existed when the run started are skipped,
    /// and so is an item whose file name was already written earlier in the
    /// same run.
    /// Only failing to prepare the checkpoint directory is an error; every
    /// per-item failure is logged and counted in the summary.
    pub async fn run_sequential(
        &self,
        items: &[CandidateItem],
        store: &CheckpointStore,
    ) -> Result<RunSummary, PipelineError> {
        store.ensure_dir()?;
        let existing = store.snapshot()?;
        let total = items.len();
        let mut summary = RunSummary::new(total);
        let mut written: HashSet<String> = HashSet::new();

        info!(
            "Sequential analysis of {} items ({} checkpoints present)",
            total,
            existing.len()
        );

        let progress = self.progress_bar(total);

        for (idx, item) in items.iter().enumerate() {
            let position = idx + 1;
            progress.set_position(idx as u64);

            if item.item_id.is_empty() {
                let err = PipelineError::MalformedInput(format!(
                    "no video id for '{}' #{}",
                    item.query, item.index_in_query
                ));
                warn!("[{}/{}] Skipping item: {}", position, total, err);
                summary.skipped_malformed += 1;
                continue;
            }

            let filename = checkpoint_filename(item);
            if existing.contains(&filename) {
                info!("[{}/{}] Skip already-processed {}", position, total, filename);
                summary.skipped_existing += 1;
                continue;
            }
            if written.contains(&filename) {
                warn!(
                    "[{}/{}] {} already written in this run by another query; skipping {}",
                    position, total, filename, item.uri
                );
                summary.skipped_existing += 1;
                continue;
            }

            info!("[{}/{}] Analyzing {}", position, total, filename);

            match analyze_item(self.client.as_ref(), item, &self.settings.system_prompt).await {
                Ok(record) => match store.persist(item, &record) {
                    Ok(path) => {
                        info!("Saved result -> {}", path.display());
                        written.insert(filename);
                        summary.persisted += 1;
                    }
                    Err(e) => {
                        error!("{}", e);
                        summary.dropped += 1;
                    }
                },
                Err(PipelineError::RateLimit(message)) => {
                    warn!(
                        "Rate limit hit on {}: {}. Stopping analysis.",
                        item.uri, message
                    );
                    summary.aborted = true;
                    summary.not_attempted = total - position;
                    break;
                }
                Err(e) => {
                    error!("Error on {}: {}", item.uri, e);
                    info!("No result for video_id={} (skipped)", item.item_id);
                    summary.dropped += 1;
                }
            }
        }

        progress.finish_and_clear();
        info!("Analysis finished: {}", summary);
        Ok(summary)
    }

    /// Analyze `items` on a bounded pool, collecting results in memory.
    ///
    /// Completion order is unspecified. After a rate limit, tasks still
    /// queued return without calling the model, tasks already calling it
    /// are left to finish, and their results are discarded.
    ///
    /// `not_attempted` counts only tasks seen returning without a call;
    /// tasks still outstanding at the abort are counted as `discarded`.
    pub async fn run_concurrent(
        &self,
        items: Vec<CandidateItem>,
    ) -> (Vec<AnalysisRecord>, RunSummary) {
        let mut summary = RunSummary::new(items.len());
        let workers = self.settings.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let abort = Arc::new(AtomicBool::new(false));
        let prompt: Arc<str> = Arc::from(self.settings.system_prompt.as_str());
        let delay = self.settings.delay;
        let mut tasks = JoinSet::new();

        info!(
            "Concurrent analysis of {} items with {} workers",
            items.len(),
            workers
        );

        for item in items {
            if item.item_id.is_empty() {
                warn!(
                    "Skipping item without video id: '{}' #{}",
                    item.query, item.index_in_query
                );
                summary.skipped_malformed += 1;
                continue;
            }

            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let abort = Arc::clone(&abort);
            let prompt = Arc::clone(&prompt);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return TaskOutcome::Cancelled;
                };
                if abort.load(Ordering::SeqCst) {
                    return TaskOutcome::Cancelled;
                }

                let outcome = match analyze_item(client.as_ref(), &item, &prompt).await {
                    Ok(record) => TaskOutcome::Analyzed(record),
                    Err(e) if e.is_rate_limit() => {
                        warn!("Rate limit hit on {}: {}", item.uri, e);
                        abort.store(true, Ordering::SeqCst);
                        TaskOutcome::RateLimited
                    }
                    Err(e) => {
                        error!("Error on {}: {}", item.uri, e);
                        TaskOutcome::Dropped
                    }
                };

                // Hold the permit through the pause so the next call waits too.
                if !delay.is_zero() && !abort.load(Ordering::SeqCst) {
                    tokio::time::sleep(delay).await;
                }
                outcome
            });
        }

        let mut records = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Analyzed(record)) => {
                    summary.persisted += 1;
                    records.push(record);
                }
                Ok(TaskOutcome::Dropped) => summary.dropped += 1,
                Ok(TaskOutcome::Cancelled) => summary.not_attempted += 1,
                Ok(TaskOutcome::RateLimited) => {
                    summary.aborted = true;
                    break;
                }
                Err(e) => {
                    error!("Analysis task failed: {}", e);
                    summary.dropped += 1;
                }
            }
        }

        if summary.aborted {
            abort.store(true, Ordering::SeqCst);
            semaphore.close();
            summary.discarded = tasks.len();
            // Let in-flight calls run out on their own; dropping the set would abort them.
            tasks.detach_all();
            warn!("Rate limit encountered. Stopped analysis.");
        }

        info!("Analysis finished: {}", summary);
        (records, summary)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// Context text sent alongside the video.
fn context_text(item: &CandidateItem) -> String {
    format!("Analyze : '{}'", item.title)
}

async fn analyze_item(
    client: &dyn AnalysisClient,
    item: &CandidateItem,
    system_prompt: &str,
) -> Result<AnalysisRecord, PipelineError> {
    info!("Checking: {}", item.uri);
    let fields = client
        .analyze(&item.uri, &context_text(item), system_prompt)
        .await?;
    info!("Success for video_id={}", item.item_id);
    Ok(item.merge_analysis(fields))
}
