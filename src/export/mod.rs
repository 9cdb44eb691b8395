//! Export of scoring results and fitted models
//!
//! - [`report`] - CSV reports and ranking of scored records
//! - [`serializer`] - Checksummed model bundle persistence

pub mod report;
pub mod serializer;

pub use report::{rank_by_score, ReportWriter, REPORT_COLUMNS};
pub use serializer::{BundleMetadata, ModelBundle};
