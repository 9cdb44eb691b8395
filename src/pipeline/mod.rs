//! Scoring pipeline: configuration and orchestration

pub mod config;
pub mod scoring;

pub use config::PipelineConfig;
pub use scoring::{RunSummary, ScoredRecord, ScoringOutcome, ScoringPipeline};
