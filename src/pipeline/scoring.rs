//! End-to-end scoring of login attempts
//!
//! Order of operations: engineer the training and full datasets
//! independently, fit the robust scaler on training features, transform both
//! matrices, fit the forest on the scaled training matrix, then score and
//! flag the scaled full matrix.

use crate::anomaly::AnomalyDetector;
use crate::data::{LoginAttemptRecord, RecordSource};
use crate::error::{AnomalyError, Result};
use crate::export::report::rank_by_score;
use crate::export::serializer::{BundleMetadata, ModelBundle};
use crate::feature_engineering::FeatureEngineer;
use crate::pipeline::config::PipelineConfig;
use crate::preprocessing::RobustScaler;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// A record with its anomaly score and flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: LoginAttemptRecord,
    /// In (0, 1]; higher is more anomalous
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

/// Run statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub n_records: usize,
    pub n_training: usize,
    pub n_flagged: usize,
    pub threshold: f64,
    pub elapsed_ms: u64,
}

/// Result of a scoring run
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Scored records in input order
    pub scored: Vec<ScoredRecord>,
    /// Fitted scaler and forest, ready to persist
    pub bundle: ModelBundle,
    /// The trusted set was empty and the model was trained on all records
    pub used_fallback_training: bool,
    pub summary: RunSummary,
}

impl ScoringOutcome {
    /// The `n` highest-scoring records, most anomalous first
    pub fn ranked(&self, n: usize) -> Vec<&ScoredRecord> {
        let mut ranked = rank_by_score(&self.scored);
        ranked.truncate(n);
        ranked
    }

    /// All records ordered by `created_at` ascending
    pub fn time_ordered(&self) -> Vec<&ScoredRecord> {
        let mut ordered: Vec<&ScoredRecord> = self.scored.iter().collect();
        ordered.sort_by_key(|s| s.record.created_at);
        ordered
    }

    /// Scores aligned with input order
    pub fn scores(&self) -> Vec<f64> {
        self.scored.iter().map(|s| s.anomaly_score).collect()
    }

    /// Flags aligned with input order
    pub fn flags(&self) -> Vec<bool> {
        self.scored.iter().map(|s| s.is_anomaly).collect()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &ScoredRecord> {
        self.scored.iter().filter(|s| s.is_anomaly)
    }
}

/// Feature engineering, robust scaling and isolation-forest scoring in one
/// entry point
#[derive(Debug, Clone, Default)]
pub struct ScoringPipeline {
    config: PipelineConfig,
    engineer: FeatureEngineer,
}

impl ScoringPipeline {
    /// Create a pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            engineer: FeatureEngineer::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Score every record of `source`, training on its trusted records
    pub fn run_source(&self, source: &dyn RecordSource) -> Result<ScoringOutcome> {
        let all = source.all_records()?;
        if all.is_empty() {
            return Err(empty_scoring_set());
        }
        let trusted = source.trusted_records()?;
        self.run(&trusted, &all)
    }

    /// Train on `trusted` and score `all`.
    ///
    /// Fails with `EmptyDataset` when `all` is empty. An empty `trusted` set
    /// falls back to training on `all`, with a warning.
    pub fn run(
        &self,
        trusted: &[LoginAttemptRecord],
        all: &[LoginAttemptRecord],
    ) -> Result<ScoringOutcome> {
        let started = Instant::now();
        if all.is_empty() {
            return Err(empty_scoring_set());
        }
        self.config.validate()?;

        let used_fallback_training = trusted.is_empty();
        let training = if used_fallback_training {
            warn!(
                records = all.len(),
                "Trusted set is empty; training on ALL records, anomalies in the data will shift the baseline"
            );
            all
        } else {
            trusted
        };

        info!(training = training.len(), scoring = all.len(), "Building features");
        let train_batch = self.engineer.enrich(training);
        let all_batch = self.engineer.enrich(all);

        let mut scaler = RobustScaler::new();
        let x_train = scaler.fit_transform(&train_batch.features)?;
        let x_all = scaler.transform(&all_batch.features)?;

        info!(trees = self.config.n_estimators, "Training isolation forest on trusted data");
        let mut forest = self.config.build_forest();
        forest.fit(&x_train)?;
        let result = forest.detect(&x_all)?;

        let scored: Vec<ScoredRecord> = all
            .iter()
            .zip(result.scores.iter().zip(result.flags.iter()))
            .map(|(record, (&anomaly_score, &is_anomaly))| ScoredRecord {
                record: record.clone(),
                anomaly_score,
                is_anomaly,
            })
            .collect();

        let metadata = BundleMetadata::new(&self.config, training.len());
        let bundle = ModelBundle::new(metadata, scaler.into_fitted()?, forest.into_model()?);

        let summary = RunSummary {
            n_records: all.len(),
            n_training: training.len(),
            n_flagged: result.n_anomalies,
            threshold: result.threshold,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            records = summary.n_records,
            flagged = summary.n_flagged,
            threshold = summary.threshold,
            elapsed_ms = summary.elapsed_ms,
            "Scored login attempts"
        );

        Ok(ScoringOutcome {
            scored,
            bundle,
            used_fallback_training,
            summary,
        })
    }
}

fn empty_scoring_set() -> AnomalyError {
    AnomalyError::EmptyDataset(
        "no login attempts to score; add data to the source and try again".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Contamination;
    use crate::data::{parse_timestamp, InMemorySource};

    fn records(n: usize) -> Vec<LoginAttemptRecord> {
        (0..n)
            .map(|i| {
                let ts = parse_timestamp(&format!("2024-02-{:02}T{:02}:00:00Z", 1 + i % 28, 8 + i % 12)).unwrap();
                LoginAttemptRecord::new(i.to_string(), ts)
                    .with_success(i % 4 != 0)
                    .with_ip(format!("95.87.{}.{}", i % 7, i % 250))
                    .with_location("Bulgaria", "Sofia", ["AS8866 Vivacom", "AS9070 Telenor BG"][i % 2])
                    .with_coordinates(42.69 + (i % 11) as f64 * 0.001, 23.32 + (i % 13) as f64 * 0.001)
            })
            .collect()
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig::new()
            .with_n_estimators(25)
            .with_contamination(Contamination::Fraction(0.1))
    }

    #[test]
    fn test_empty_scoring_set() {
        let pipeline = ScoringPipeline::new(small_config());
        let err = pipeline.run(&records(5), &[]).unwrap_err();
        assert!(matches!(err, AnomalyError::EmptyDataset(_)));
    }

    #[test]
    fn test_fallback_training() {
        let pipeline = ScoringPipeline::new(small_config());
        let all = records(40);
        let outcome = pipeline.run(&[], &all).unwrap();
        assert!(outcome.used_fallback_training);
        assert_eq!(outcome.summary.n_training, 40);
        assert_eq!(outcome.scored.len(), 40);
    }

    #[test]
    fn test_output_preserves_input_order() {
        let pipeline = ScoringPipeline::new(small_config());
        let all = records(30);
        let outcome = pipeline.run(&all[..20], &all).unwrap();
        for (scored, record) in outcome.scored.iter().zip(&all) {
            assert_eq!(&scored.record, record);
        }
        assert_eq!(outcome.scores().len(), 30);
        assert_eq!(outcome.flags().len(), 30);
        assert_eq!(outcome.summary.n_flagged, outcome.flagged().count());
    }

    #[test]
    fn test_ranked_is_descending() {
        let pipeline = ScoringPipeline::new(small_config());
        let outcome = pipeline.run(&[], &records(50)).unwrap();
        let ranked = outcome.ranked(10);
        assert_eq!(ranked.len(), 10);
        for pair in ranked.windows(2) {
            assert!(pair[0].anomaly_score >= pair[1].anomaly_score);
        }
    }

    #[test]
    fn test_run_source_uses_trust_policy() {
        let mut all = records(30);
        all[3].asn = Some("AS16276 OVH".to_string());
        let source = InMemorySource::new(all);
        let outcome = ScoringPipeline::new(small_config()).run_source(&source).unwrap();
        assert!(!outcome.used_fallback_training);
        assert_eq!(outcome.summary.n_training, 29);
        assert_eq!(outcome.summary.n_records, 30);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let pipeline = ScoringPipeline::new(PipelineConfig::new().with_n_estimators(0));
        let err = pipeline.run(&[], &records(3)).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidParameter { .. }));
    }
}
