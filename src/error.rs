//! Error types for login anomaly scoring

use thiserror::Error;

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// Main error type for the scoring core and its collaborators
#[derive(Error, Debug)]
pub enum AnomalyError {
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// A single record field that could not be interpreted. Always recovered
    /// locally with a sentinel value; only ever logged.
    #[error("Invalid record field `{field}` = {value:?}: {reason}")]
    InvalidRecordField {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Not fitted: {0}")]
    UnfittedState(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnomalyError {
    /// Build a recovered-field error for logging
    pub fn invalid_field(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AnomalyError::InvalidRecordField {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Build a column-count mismatch error
    pub fn columns(expected: usize, actual: usize) -> Self {
        AnomalyError::DimensionMismatch {
            expected: format!("{} columns", expected),
            actual: format!("{} columns", actual),
        }
    }
}

impl From<serde_json::Error> for AnomalyError {
    fn from(err: serde_json::Error) -> Self {
        AnomalyError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for AnomalyError {
    fn from(err: csv::Error) -> Self {
        AnomalyError::DataError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AnomalyError {
    fn from(err: ndarray::ShapeError) -> Self {
        AnomalyError::DimensionMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnomalyError::EmptyDataset("no login attempts".to_string());
        assert_eq!(err.to_string(), "Empty dataset: no login attempts");
    }

    #[test]
    fn test_columns_mismatch_display() {
        let err = AnomalyError::columns(10, 3);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected 10 columns, got 3 columns"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnomalyError = io_err.into();
        assert!(matches!(err, AnomalyError::IoError(_)));
    }
}
