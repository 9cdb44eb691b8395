//! Model bundle persistence
//!
//! A [`ModelBundle`] holds everything needed to re-score data exactly as the
//! run that produced it: the fitted scaler and the fitted forest. On disk it
//! is a JSON envelope whose payload is checksummed with FNV-1a.

use crate::anomaly::{Contamination, IsolationForestModel};
use crate::data::LoginAttemptRecord;
use crate::error::{AnomalyError, Result};
use crate::feature_engineering::{FeatureEngineer, FEATURE_NAMES};
use crate::pipeline::{PipelineConfig, ScoredRecord};
use crate::preprocessing::FittedScaler;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Magic string identifying bundle files
const MAGIC: &str = "LOGIN-IFOREST";
/// Current format version
const FORMAT_VERSION: u32 = 1;

/// Provenance of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Training timestamp
    pub trained_at: DateTime<Utc>,
    /// Feature column order
    pub feature_names: Vec<String>,
    pub n_training_rows: usize,
    pub n_estimators: usize,
    pub random_state: Option<u64>,
    pub contamination: Contamination,
    /// Version of the crate that wrote the bundle
    pub crate_version: String,
}

impl BundleMetadata {
    pub fn new(config: &PipelineConfig, n_training_rows: usize) -> Self {
        Self {
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            n_training_rows,
            n_estimators: config.n_estimators,
            random_state: config.random_state,
            contamination: config.contamination,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Fitted scaler and forest as one reloadable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata: BundleMetadata,
    pub scaler: FittedScaler,
    pub forest: IsolationForestModel,
}

/// On-disk wrapper
#[derive(Debug, Serialize, Deserialize)]
struct BundleEnvelope {
    magic: String,
    format_version: u32,
    checksum: u64,
    payload: String,
}

impl ModelBundle {
    pub fn new(metadata: BundleMetadata, scaler: FittedScaler, forest: IsolationForestModel) -> Self {
        Self {
            metadata,
            scaler,
            forest,
        }
    }

    /// Scale and score an unscaled feature matrix
    pub fn score_matrix(&self, features: &Array2<f64>) -> Result<(Array1<f64>, Array1<bool>)> {
        let scaled = self.scaler.transform(features)?;
        let scores = self.forest.score(&scaled)?;
        let flags = self.forest.flag(&scores);
        Ok((scores, flags))
    }

    /// Engineer, scale and score `records`, preserving their order
    pub fn score_records(
        &self,
        engineer: &FeatureEngineer,
        records: &[LoginAttemptRecord],
    ) -> Result<Vec<ScoredRecord>> {
        if records.is_empty() {
            return Err(AnomalyError::EmptyDataset("no login attempts to score".to_string()));
        }
        let batch = engineer.enrich(records);
        let (scores, flags) = self.score_matrix(&batch.features)?;
        Ok(records
            .iter()
            .zip(scores.iter().zip(flags.iter()))
            .map(|(record, (&anomaly_score, &is_anomaly))| ScoredRecord {
                record: record.clone(),
                anomaly_score,
                is_anomaly,
            })
            .collect())
    }

    /// Serialize to the checksummed JSON envelope
    pub fn to_json(&self) -> Result<String> {
        let payload = serde_json::to_string(self)?;
        let envelope = BundleEnvelope {
            magic: MAGIC.to_string(),
            format_version: FORMAT_VERSION,
            checksum: fnv1a(payload.as_bytes()),
            payload,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Parse and verify a JSON envelope
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: BundleEnvelope = serde_json::from_str(json)?;
        Self::open(envelope)
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(self.to_json()?.as_bytes())?;
        writer.flush()?;
        info!(path = %path.display(), trees = self.forest.trees().len(), "Saved model bundle");
        Ok(())
    }

    /// Load from file, verifying magic, version and checksum
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let envelope: BundleEnvelope = serde_json::from_reader(reader)?;
        Self::open(envelope)
    }

    fn open(envelope: BundleEnvelope) -> Result<Self> {
        if envelope.magic != MAGIC {
            return Err(AnomalyError::SerializationError(format!(
                "not a model bundle (magic {:?})",
                envelope.magic
            )));
        }
        if envelope.format_version > FORMAT_VERSION {
            return Err(AnomalyError::SerializationError(format!(
                "unsupported bundle version {} (max {})",
                envelope.format_version, FORMAT_VERSION
            )));
        }
        if fnv1a(envelope.payload.as_bytes()) != envelope.checksum {
            return Err(AnomalyError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        let bundle: Self = serde_json::from_str(&envelope.payload)?;
        if bundle.scaler.n_features() != bundle.forest.n_features() {
            return Err(AnomalyError::columns(
                bundle.forest.n_features(),
                bundle.scaler.n_features(),
            ));
        }
        Ok(bundle)
    }
}

/// FNV-1a hash
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
