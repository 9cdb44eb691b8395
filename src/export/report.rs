//! Scored-record reports (CSV) and ranking

use crate::error::{AnomalyError, Result};
use crate::pipeline::ScoredRecord;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Report column order
pub const REPORT_COLUMNS: [&str; 12] = [
    "id",
    "user_id",
    "created_at",
    "ip_address",
    "country",
    "city",
    "asn",
    "latitude",
    "longitude",
    "success",
    "anomaly_score",
    "is_anomaly",
];

/// Records sorted by descending score; ties keep input order
pub fn rank_by_score(scored: &[ScoredRecord]) -> Vec<&ScoredRecord> {
    let mut ranked: Vec<&ScoredRecord> = scored.iter().collect();
    ranked.sort_by(|a, b| b.anomaly_score.total_cmp(&a.anomaly_score));
    ranked
}

/// CSV writer for scored records
#[derive(Debug, Clone)]
pub struct ReportWriter {
    delimiter: u8,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Write a header and one row per record
    pub fn write<'a, W, I>(&self, writer: W, rows: I) -> Result<()>
    where
        W: Write,
        I: IntoIterator<Item = &'a ScoredRecord>,
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        wtr.write_record(REPORT_COLUMNS)?;
        for row in rows {
            let r = &row.record;
            wtr.write_record([
                r.id.clone(),
                r.user_id.clone().unwrap_or_default(),
                r.created_at.to_rfc3339(),
                r.ip_address.clone().unwrap_or_default(),
                r.country.clone().unwrap_or_default(),
                r.city.clone().unwrap_or_default(),
                r.asn.clone().unwrap_or_default(),
                r.latitude.map(|v| v.to_string()).unwrap_or_default(),
                r.longitude.map(|v| v.to_string()).unwrap_or_default(),
                r.success.to_string(),
                row.anomaly_score.to_string(),
                row.is_anomaly.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Render the report into a string
    pub fn to_string<'a, I>(&self, rows: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a ScoredRecord>,
    {
        let mut buffer = Vec::new();
        self.write(&mut buffer, rows)?;
        String::from_utf8(buffer)
            .map_err(|e| AnomalyError::DataError(format!("UTF-8 conversion error: {}", e)))
    }

    /// Write the report to `path`
    pub fn write_path<'a, I>(&self, path: impl AsRef<Path>, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ScoredRecord>,
    {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write(std::io::BufWriter::new(file), rows)?;
        info!(path = %path.display(), "Saved scored report");
        Ok(())
    }
}
