//! Anomaly detection module
//!
//! Provides the isolation forest used to score login attempts.

mod isolation_forest;

pub use isolation_forest::{
    average_path_length, Contamination, IsolationForest, IsolationForestModel, IsolationTree,
    MaxSamples,
};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Anomaly scores (higher = more anomalous)
    pub scores: Array1<f64>,
    /// `true` where the score exceeds the threshold
    pub flags: Array1<bool>,
    /// Threshold used for classification
    pub threshold: f64,
    /// Number of anomalies detected
    pub n_anomalies: usize,
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Compute anomaly scores for new data
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Flag anomalies in new data
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>>;

    /// Fit and predict in one step
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<bool>> {
        self.fit(x)?;
        self.predict(x)
    }

    /// Get detection results with scores and flags
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.score_samples(x)?;
        let threshold = self.threshold()?;
        let flags = scores.mapv(|s| s > threshold);
        let n_anomalies = flags.iter().filter(|&&f| f).count();

        Ok(AnomalyResult {
            scores,
            flags,
            threshold,
            n_anomalies,
        })
    }

    /// Get the decision threshold
    fn threshold(&self) -> Result<f64>;
}
