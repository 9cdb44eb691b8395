//! Login-attempt feature engineering
//!
//! Turns a dataset of [`LoginAttemptRecord`]s into a fixed-width numeric
//! matrix. Dataset-level aggregates (geo medians, category frequencies) are
//! computed first from the dataset itself; rows are then mapped in parallel.

use crate::data::LoginAttemptRecord;
use crate::feature_engineering::frequency::FrequencyTable;
use crate::feature_engineering::ip::{ip_to_numeric, IpStatus};
use crate::utils::stats::median;
use chrono::{Datelike, Timelike};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of engineered features per record
pub const N_FEATURES: usize = 10;

/// Column order of the feature matrix
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "latitude",
    "longitude",
    "hour",
    "day_of_week",
    "month",
    "success",
    "ip_numeric",
    "country_freq",
    "city_freq",
    "asn_freq",
];

/// Per-record account of which features were substituted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub latitude_imputed: bool,
    pub longitude_imputed: bool,
    pub ip_status: IpStatus,
}

/// Medians used to fill missing coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoMedians {
    pub latitude: f64,
    pub longitude: f64,
}

/// Frequency tables of the three categorical columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTables {
    pub country: FrequencyTable,
    pub city: FrequencyTable,
    pub asn: FrequencyTable,
}

/// Output of [`FeatureEngineer::enrich`]
#[derive(Debug, Clone)]
pub struct EnrichedBatch {
    /// One row per input record, in input order
    pub features: Array2<f64>,
    /// Aligned with `features` rows
    pub metadata: Vec<RecordMetadata>,
    pub geo_medians: GeoMedians,
    pub tables: CategoryTables,
}

impl EnrichedBatch {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of records with any substituted feature
    pub fn n_recovered(&self) -> usize {
        self.metadata
            .iter()
            .filter(|m| m.latitude_imputed || m.longitude_imputed || m.ip_status != IpStatus::Parsed)
            .count()
    }
}

/// Maps login-attempt records to feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Create a new feature engineer
    pub fn new() -> Self {
        Self
    }

    /// Engineer the feature matrix of one dataset.
    ///
    /// Pure function of `records`: medians and frequency tables come from
    /// this dataset only, so training and scoring sets are encoded
    /// independently.
    pub fn enrich(&self, records: &[LoginAttemptRecord]) -> EnrichedBatch {
        let geo_medians = Self::geo_medians(records);
        let tables = Self::category_tables(records);

        let rows: Vec<([f64; N_FEATURES], RecordMetadata)> = records
            .par_iter()
            .map(|record| Self::encode(record, &geo_medians, &tables))
            .collect();

        let mut features = Array2::zeros((rows.len(), N_FEATURES));
        let mut metadata = Vec::with_capacity(rows.len());
        for (mut target, (values, meta)) in features.rows_mut().into_iter().zip(rows) {
            target.assign(&ArrayView1::from(&values[..]));
            metadata.push(meta);
        }

        let batch = EnrichedBatch {
            features,
            metadata,
            geo_medians,
            tables,
        };
        debug!(
            rows = batch.n_rows(),
            recovered = batch.n_recovered(),
            countries = batch.tables.country.len(),
            asns = batch.tables.asn.len(),
            "Engineered login features"
        );
        batch
    }

    fn geo_medians(records: &[LoginAttemptRecord]) -> GeoMedians {
        let lats: Vec<f64> = records.iter().filter_map(|r| finite(r.latitude)).collect();
        let lons: Vec<f64> = records.iter().filter_map(|r| finite(r.longitude)).collect();
        GeoMedians {
            latitude: median(&lats).unwrap_or(0.0),
            longitude: median(&lons).unwrap_or(0.0),
        }
    }

    fn category_tables(records: &[LoginAttemptRecord]) -> CategoryTables {
        CategoryTables {
            country: FrequencyTable::from_values(records.iter().map(|r| r.country.as_deref())),
            city: FrequencyTable::from_values(records.iter().map(|r| r.city.as_deref())),
            asn: FrequencyTable::from_values(records.iter().map(|r| r.asn.as_deref())),
        }
    }

    fn encode(
        record: &LoginAttemptRecord,
        geo: &GeoMedians,
        tables: &CategoryTables,
    ) -> ([f64; N_FEATURES], RecordMetadata) {
        let latitude = finite(record.latitude);
        let longitude = finite(record.longitude);
        let (ip_numeric, ip_status) = ip_to_numeric(record.ip_address.as_deref());
        let ts = &record.created_at;

        let values = [
            latitude.unwrap_or(geo.latitude),
            longitude.unwrap_or(geo.longitude),
            ts.hour() as f64,
            ts.weekday().num_days_from_monday() as f64,
            ts.month() as f64,
            if record.success { 1.0 } else { 0.0 },
            ip_numeric,
            tables.country.encode(record.country.as_deref()),
            tables.city.encode(record.city.as_deref()),
            tables.asn.encode(record.asn.as_deref()),
        ];
        let meta = RecordMetadata {
            latitude_imputed: latitude.is_none(),
            longitude_imputed: longitude.is_none(),
            ip_status,
        };
        (values, meta)
    }
}

/// Non-finite coordinates count as missing
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
