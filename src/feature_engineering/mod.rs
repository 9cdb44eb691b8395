//! Feature engineering for login attempts
//!
//! - [`ip`] - IP address to numeric mapping
//! - [`frequency`] - Normalized categorical frequency tables
//! - [`login`] - The [`FeatureEngineer`] producing the 10-column matrix

pub mod frequency;
pub mod ip;
pub mod login;

pub use frequency::FrequencyTable;
pub use ip::{ip_to_int, ip_to_numeric, IpStatus};
pub use login::{
    CategoryTables, EnrichedBatch, FeatureEngineer, GeoMedians, RecordMetadata, FEATURE_NAMES,
    N_FEATURES,
};
