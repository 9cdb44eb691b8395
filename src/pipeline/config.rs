//! Scoring pipeline configuration

use crate::anomaly::{Contamination, IsolationForest, MaxSamples};
use crate::data::TrustPolicy;
use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of isolation trees
    pub n_estimators: usize,

    /// Rows drawn per tree
    pub max_samples: MaxSamples,

    /// Expected share of anomalies in the trusted training set
    pub contamination: Contamination,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,

    /// Number of threads for parallel processing (None = all cores)
    pub n_jobs: Option<usize>,

    /// Rows shown in the ranked view
    pub top_n: usize,

    /// Which records count as trusted training data
    pub trust: TrustPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::Fraction(0.02),
            random_state: Some(42),
            n_jobs: None,
            top_n: 20,
            trust: TrustPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnomalyError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            AnomalyError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set rows per tree
    pub fn with_max_samples(mut self, max_samples: MaxSamples) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Builder method to set contamination
    pub fn with_contamination(mut self, contamination: Contamination) -> Self {
        self.contamination = contamination;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set number of threads
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Builder method to set the ranked view size
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Builder method to set the trust policy
    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// Reject values the forest cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", &self.n_estimators, "must be at least 1"));
        }
        if let Contamination::Fraction(c) = self.contamination {
            if !(c > 0.0 && c <= 0.5) {
                return Err(invalid("contamination", &c, "must be in (0, 0.5]"));
            }
        }
        match self.max_samples {
            MaxSamples::Count(0) => {
                return Err(invalid("max_samples", &0, "must be at least 1"));
            }
            MaxSamples::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(invalid("max_samples", &f, "fraction must be in (0, 1]"));
            }
            _ => {}
        }
        if self.n_jobs == Some(0) {
            return Err(invalid("n_jobs", &0, "must be at least 1"));
        }
        Ok(())
    }

    /// Unfitted forest carrying these parameters
    pub fn build_forest(&self) -> IsolationForest {
        let mut forest = IsolationForest::new()
            .with_n_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
            .with_contamination(self.contamination);
        if let Some(seed) = self.random_state {
            forest = forest.with_seed(seed);
        }
        if let Some(n_jobs) = self.n_jobs {
            forest = forest.with_n_jobs(n_jobs);
        }
        forest
    }
}

fn invalid(name: &str, value: &dyn std::fmt::Display, reason: &str) -> AnomalyError {
    AnomalyError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
