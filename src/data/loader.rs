//! Record loading from CSV / TSV / JSON-lines exports
//!
//! Every column is read as text first and interpreted afterwards, so a single
//! malformed field never rejects its row. Interpretation failures become
//! [`AnomalyError::InvalidRecordField`] values that are logged and counted,
//! then replaced with a sentinel.

use crate::data::record::{epoch, parse_timestamp, LoginAttemptRecord};
use crate::error::{AnomalyError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

const COLUMNS: [&str; 10] = [
    "id",
    "user_id",
    "success",
    "ip_address",
    "country",
    "city",
    "asn",
    "latitude",
    "longitude",
    "created_at",
];

/// Untyped row as read from storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLoginAttempt {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub success: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub asn: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub created_at: Option<String>,
}

impl RawLoginAttempt {
    fn set(&mut self, column: &str, value: Option<String>) {
        let slot = match column {
            "id" => &mut self.id,
            "user_id" => &mut self.user_id,
            "success" => &mut self.success,
            "ip_address" => &mut self.ip_address,
            "country" => &mut self.country,
            "city" => &mut self.city,
            "asn" => &mut self.asn,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "created_at" => &mut self.created_at,
            _ => return,
        };
        *slot = value;
    }

    /// Build from a JSON object; unknown keys are ignored
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut raw = Self::default();
        for column in COLUMNS {
            let text = match object.get(column) {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(s)) => non_empty(s),
                Some(other) => Some(other.to_string()),
            };
            raw.set(column, text);
        }
        Some(raw)
    }

    /// Interpret the row. `row` is used for the fallback id.
    ///
    /// Returns the record plus every field that had to be recovered.
    pub fn into_record(self, row: usize) -> (LoginAttemptRecord, Vec<AnomalyError>) {
        let mut issues = Vec::new();

        let id = self.id.unwrap_or_else(|| {
            issues.push(AnomalyError::invalid_field("id", "", "missing identifier"));
            format!("row-{}", row)
        });

        let created_at = match self.created_at {
            Some(raw) => parse_timestamp(&raw).unwrap_or_else(|| {
                issues.push(AnomalyError::invalid_field(
                    "created_at",
                    raw,
                    "unparseable timestamp, using Unix epoch",
                ));
                epoch()
            }),
            None => {
                issues.push(AnomalyError::invalid_field(
                    "created_at",
                    "",
                    "missing timestamp, using Unix epoch",
                ));
                epoch()
            }
        };

        let success = match self.success.as_deref().map(|s| s.to_ascii_lowercase()) {
            None => false,
            Some(s) => match s.as_str() {
                "true" | "t" | "1" | "yes" | "y" => true,
                "false" | "f" | "0" | "no" | "n" => false,
                _ => {
                    issues.push(AnomalyError::invalid_field(
                        "success",
                        s.clone(),
                        "not a boolean, using false",
                    ));
                    false
                }
            },
        };

        let latitude = parse_coordinate("latitude", self.latitude, &mut issues);
        let longitude = parse_coordinate("longitude", self.longitude, &mut issues);

        let record = LoginAttemptRecord {
            id,
            user_id: self.user_id,
            success,
            ip_address: self.ip_address.map(normalize_inet),
            country: self.country,
            city: self.city,
            asn: self.asn,
            latitude,
            longitude,
            created_at,
        };
        (record, issues)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_coordinate(
    field: &str,
    raw: Option<String>,
    issues: &mut Vec<AnomalyError>,
) -> Option<f64> {
    let raw = raw?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            issues.push(AnomalyError::invalid_field(
                field,
                raw,
                "not a finite number, treating as missing",
            ));
            None
        }
    }
}

/// Strip a full-length host prefix from a Postgres `inet` text rendering.
///
/// `192.168.1.1/32` becomes `192.168.1.1` and `::1/128` becomes `::1`; any
/// other value is returned unchanged.
pub fn normalize_inet(raw: String) -> String {
    if let Some((addr, prefix)) = raw.split_once('/') {
        match (addr.parse::<IpAddr>(), prefix) {
            (Ok(IpAddr::V4(_)), "32") | (Ok(IpAddr::V6(_)), "128") => return addr.to_string(),
            _ => {}
        }
    }
    raw
}

/// Input format, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Tsv,
    JsonLines,
}

impl RecordFormat {
    /// Detect from extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "tsv" => RecordFormat::Tsv,
            "jsonl" | "ndjson" | "json" => RecordFormat::JsonLines,
            _ => RecordFormat::Csv,
        }
    }
}

/// Loader for login-attempt exports
#[derive(Debug, Clone, Default)]
pub struct RecordLoader {
    /// Abort on the first malformed row instead of skipping it
    strict: bool,
}

impl RecordLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on rows that cannot be read at all (bad CSV framing, bad JSON)
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<Vec<LoginAttemptRecord>> {
        let path = path.as_ref();
        let raws = match RecordFormat::from_path(path) {
            RecordFormat::Csv => self.read_delimited(path, b',')?,
            RecordFormat::Tsv => self.read_delimited(path, b'\t')?,
            RecordFormat::JsonLines => self.read_json_lines(path)?,
        };
        let records = Self::interpret(raws);
        info!(path = %path.display(), records = records.len(), "Loaded login attempts");
        Ok(records)
    }

    /// Load a delimited file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<Vec<LoginAttemptRecord>> {
        Ok(Self::interpret(self.read_delimited(path.as_ref(), b',')?))
    }

    /// Load newline-delimited JSON objects
    pub fn load_json_lines(&self, path: impl AsRef<Path>) -> Result<Vec<LoginAttemptRecord>> {
        Ok(Self::interpret(self.read_json_lines(path.as_ref())?))
    }

    fn interpret(raws: Vec<RawLoginAttempt>) -> Vec<LoginAttemptRecord> {
        let mut recovered = 0usize;
        let records: Vec<LoginAttemptRecord> = raws
            .into_iter()
            .enumerate()
            .map(|(row, raw)| {
                let (record, issues) = raw.into_record(row);
                for issue in &issues {
                    debug!(row, id = %record.id, "{}", issue);
                }
                recovered += issues.len();
                record
            })
            .collect();
        if recovered > 0 {
            warn!(recovered, "Recovered malformed record fields with sentinel values");
        }
        records
    }

    fn read_delimited(&self, path: &Path, delimiter: u8) -> Result<Vec<RawLoginAttempt>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let positions: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect();

        let mut raws = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) if !self.strict => {
                    warn!(row, error = %e, "Skipping unreadable row");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let mut raw = RawLoginAttempt::default();
            for column in COLUMNS {
                let value = positions
                    .get(column)
                    .and_then(|&i| record.get(i))
                    .and_then(non_empty);
                raw.set(column, value);
            }
            raws.push(raw);
        }
        Ok(raws)
    }

    fn read_json_lines(&self, path: &Path) -> Result<Vec<RawLoginAttempt>> {
        let reader = BufReader::new(File::open(path)?);
        let mut raws = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<serde_json::Value>(&line)
                .map_err(AnomalyError::from)
                .and_then(|value| {
                    RawLoginAttempt::from_json(&value).ok_or_else(|| {
                        AnomalyError::DataError(format!("line {} is not a JSON object", line_no + 1))
                    })
                });
            match parsed {
                Ok(raw) => raws.push(raw),
                Err(e) if !self.strict => {
                    warn!(line = line_no + 1, error = %e, "Skipping unreadable line");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(raws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_normalize_inet() {
        assert_eq!(normalize_inet("192.168.1.1/32".into()), "192.168.1.1");
        assert_eq!(normalize_inet("::1/128".into()), "::1");
        assert_eq!(normalize_inet("10.0.0.0/8".into()), "10.0.0.0/8");
        assert_eq!(normalize_inet("garbage".into()), "garbage");
    }

    #[test]
    fn test_into_record_recovers_fields() {
        let raw = RawLoginAttempt {
            id: None,
            success: Some("maybe".into()),
            latitude: Some("north".into()),
            longitude: Some("23.5".into()),
            created_at: Some("not a time".into()),
            ..Default::default()
        };
        let (record, issues) = raw.into_record(7);
        assert_eq!(record.id, "row-7");
        assert!(!record.success);
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, Some(23.5));
        assert_eq!(record.created_at, epoch());
        assert_eq!(issues.len(), 4);
        assert!(issues
            .iter()
            .all(|e| matches!(e, AnomalyError::InvalidRecordField { .. })));
    }

    #[test]
    fn test_from_json_numbers_and_nulls() {
        let value = serde_json::json!({
            "id": 42,
            "user_id": null,
            "success": true,
            "ip_address": "8.8.8.8",
            "latitude": 1.5,
            "created_at": "2024-01-01T10:00:00Z"
        });
        let raw = RawLoginAttempt::from_json(&value).unwrap();
        let (record, issues) = raw.into_record(0);
        assert!(issues.is_empty());
        assert_eq!(record.id, "42");
        assert!(record.user_id.is_none());
        assert!(record.success);
        assert_eq!(record.latitude, Some(1.5));
        assert_eq!(record.created_at.hour(), 10);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(RecordFormat::from_path(Path::new("a.tsv")), RecordFormat::Tsv);
        assert_eq!(RecordFormat::from_path(Path::new("a.JSONL")), RecordFormat::JsonLines);
        assert_eq!(RecordFormat::from_path(Path::new("a.txt")), RecordFormat::Csv);
    }
}
