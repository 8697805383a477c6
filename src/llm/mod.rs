//! Generative model clients.
//!
//! The analysis orchestrator only depends on [`AnalysisClient`]. A call
//! either yields the model's JSON object or a [`PipelineError`] whose
//! variant tells the caller whether the failure is a rate limit.

pub mod gemini;

pub use gemini::GeminiClient;

use crate::error::PipelineError;
use crate::models::AnalysisFields;
use async_trait::async_trait;

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Analyze the resource at `resource_uri`.
    ///
    /// Returns [`PipelineError::RateLimit`] when the service reports quota
    /// exhaustion and [`PipelineError::Transport`] for every other failure.
    async fn analyze(
        &self,
        resource_uri: &str,
        context_text: &str,
        system_prompt: &str,
    ) -> Result<AnalysisFields, PipelineError>;
}
