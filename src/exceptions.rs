//! ## Custom Errors for Farm Load
//!
//! This module defines the error type shared by every stage of the farm feature pipeline.
//! It uses the `thiserror` crate to derive the `Error` trait.
//!
//! The data-shape variants (`InsufficientData`, `MissingKey`, `DuplicateKey`, `SchemaMismatch`,
//! `NotFitted`) are deterministic: retrying the same input yields the same error, so they
//! abort the stage and propagate to the caller.
//!
//! ### Example
//!
//! ```rust
//! use farm_load::exceptions::{FarmLoadError, FarmLoadResult};
//!
//! fn mode_of_empty_column() -> FarmLoadResult<f64> {
//!     Err(FarmLoadError::InsufficientData("farm_type".into()))
//! }
//! ```

use thiserror::Error;

/// Errors raised by the farm load feature pipeline.
#[derive(Debug, Error)]
pub enum FarmLoadError {
    /// Reading or writing a table, settings file or model artifact failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Planning or executing a query failed.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Building or casting Arrow arrays failed.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet encoding or decoding failed.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Wraps (de)serialization errors of settings files and model artifacts.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A categorical column has no valid (non-null, non-sentinel) value to take the mode of.
    #[error("Insufficient data: column '{0}' has no non-missing value to compute a mode from")]
    InsufficientData(String),

    /// The grouping/join key is null on some rows.
    #[error("Missing key: column '{column}' is null on {rows} row(s)")]
    MissingKey { column: String, rows: usize },

    /// A key that must be unique appears more than once.
    #[error("Duplicate key: {rows} value(s) of column '{column}' appear more than once")]
    DuplicateKey { column: String, rows: usize },

    /// Inference input cannot be aligned with the expected feature schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A stateful transformer or model was used before being fitted.
    #[error("Not fitted: {0} must be fitted before transform is called")]
    NotFitted(String),

    /// A configured column is absent from the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A setting is out of range or a file format is not supported.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A convenient result type for farm load operations.
pub type FarmLoadResult<T> = std::result::Result<T, FarmLoadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_wrapped_errors_keep_their_source_message() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "wells.parquet");
        let err = FarmLoadError::from(missing);
        assert_eq!(err.to_string(), "I/O error: wells.parquet");

        let plan = datafusion::error::DataFusionError::Plan("no field farm_id".into());
        let err = FarmLoadError::from(plan);
        assert!(err.to_string().starts_with("DataFusion error:"));
        assert!(err.to_string().ends_with("no field farm_id"));
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
        let err: FarmLoadError = json_err.into();
        assert!(format!("{}", err).starts_with("Serialization error:"));
    }

    #[test]
    fn test_insufficient_data_error() {
        let err = FarmLoadError::InsufficientData("farm_type".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Insufficient data:"));
        assert!(err_msg.contains("farm_type"));
    }

    #[test]
    fn test_missing_key_error() {
        let err = FarmLoadError::MissingKey {
            column: "farm_id".into(),
            rows: 3,
        };
        assert_eq!(
            format!("{}", err),
            "Missing key: column 'farm_id' is null on 3 row(s)"
        );
    }

    #[test]
    fn test_duplicate_key_error() {
        let err = FarmLoadError::DuplicateKey {
            column: "farm_id".into(),
            rows: 1,
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Duplicate key:"));
        assert!(err_msg.contains("'farm_id'"));
    }

    #[test]
    fn test_not_fitted_error() {
        let err = FarmLoadError::NotFitted("OutlierCapper".into());
        assert!(format!("{}", err).contains("OutlierCapper must be fitted"));
    }

    #[test]
    fn test_schema_mismatch_error() {
        let err = FarmLoadError::SchemaMismatch("empty feature list".into());
        assert!(format!("{}", err).contains("Schema mismatch:"));
    }
}
