//! Analysis phase.
//!
//! [`runner`] sends candidates to the model and checkpoints the results;
//! [`aggregator`] merges the checkpoint directory into the final dataset.

pub mod aggregator;
pub mod runner;

pub use aggregator::{load_all_records, write_final_output};
pub use runner::{AnalysisRunner, AnalysisSettings};
