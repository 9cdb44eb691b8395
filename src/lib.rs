//! Login Anomaly - Isolation-forest scoring of login attempts
//!
//! This crate ranks login attempts by how unusual they look compared to a
//! trusted baseline of logins:
//! - Loading login attempts from CSV, TSV or JSON Lines
//! - Feature engineering (geo, time, IP, categorical frequency)
//! - Robust scaling (median / interquartile range)
//! - Isolation forest training and scoring
//! - Ranked CSV reports and checksummed model bundles
//!
//! # Modules
//!
//! - [`data`] - Login attempt records, loaders and record sources
//! - [`feature_engineering`] - Numeric feature matrix construction
//! - [`preprocessing`] - Robust scaling
//! - [`anomaly`] - Isolation forest
//! - [`pipeline`] - End-to-end scoring pipeline and configuration
//! - [`export`] - Reports and model persistence
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use login_anomaly::prelude::*;
//!
//! let source = InMemorySource::from_path("logins.csv")?;
//! let outcome = ScoringPipeline::new(PipelineConfig::default()).run_source(&source)?;
//! for scored in outcome.ranked(20) {
//!     println!("{} {:.4}", scored.record.id, scored.anomaly_score);
//! }
//! # Ok::<(), login_anomaly::AnomalyError>(())
//! ```

// Core error handling
pub mod error;

// Data and features
pub mod data;
pub mod feature_engineering;
pub mod preprocessing;

// Detection
pub mod anomaly;
pub mod pipeline;

// Output
pub mod export;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{AnomalyError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AnomalyError, Result};

    // Data
    pub use crate::data::{
        InMemorySource, LoginAttemptRecord, RecordLoader, RecordSource, TrustPolicy,
    };

    // Features and scaling
    pub use crate::feature_engineering::{EnrichedBatch, FeatureEngineer, FEATURE_NAMES};
    pub use crate::preprocessing::{FittedScaler, RobustScaler};

    // Anomaly detection
    pub use crate::anomaly::{
        AnomalyDetector, AnomalyResult, Contamination, IsolationForest, IsolationForestModel,
        MaxSamples,
    };

    // Pipeline
    pub use crate::pipeline::{PipelineConfig, ScoredRecord, ScoringOutcome, ScoringPipeline};

    // Export
    pub use crate::export::{ModelBundle, ReportWriter};
}
