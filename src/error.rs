//! Centralized error handling for tabscrub.
//!
//! Cleaning operations distinguish between two kinds of trouble:
//!
//! - **Anomalies** in the data, e.g. a label outside the vocabulary. These are never errors. They
//!   are collected into the [`CleaningReport`](crate::cleaning::CleaningReport) returned with the
//!   cleaned table.
//! - **Errors** that stop an operation, e.g. an unknown column or a strict coercion that meets a
//!   bad value. These are [`CleanError`].
//!
//! ```
//! use tabscrub::error::CleanError;
//!
//! fn describe(err: &CleanError) -> String {
//!     match err {
//!         CleanError::UnknownColumn(name) => format!("no such column {name}"),
//!         CleanError::TypeCoercion { row, .. } => format!("bad value at {row}"),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use crate::table::{LogicalType, RowKey};
use std::fmt;

/// Main error type for tabscrub operations.
#[derive(Debug)]
pub enum CleanError {
    /// A column name that is not part of the table schema
    UnknownColumn(String),

    /// A schema or added column would contain the same name twice
    DuplicateColumn(String),

    /// A value does not match the declared type of its column
    TypeMismatch {
        column: String,
        expected: LogicalType,
        found: String,
    },

    /// A row has the wrong number of values for the schema
    RowWidth { expected: usize, found: usize },

    /// A row key is already present in the table
    DuplicateRowKey(RowKey),

    /// Strict coercion met a value it could not convert
    TypeCoercion {
        column: String,
        row: RowKey,
        value: String,
        target: LogicalType,
    },

    /// The operation does not apply to columns of this type
    UnsupportedType {
        column: String,
        operation: &'static str,
        found: LogicalType,
    },

    /// Operation parameters are malformed
    InvalidParameter(String),

    /// Data processing errors from the Polars engine
    DataProcessing(String),

    /// Configuration errors
    Config(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for CleanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(name) => write!(f, "Unknown column '{name}'"),
            Self::DuplicateColumn(name) => write!(f, "Duplicate column '{name}'"),
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "Column '{column}' is declared {expected} but received {found}"
            ),
            Self::RowWidth { expected, found } => {
                write!(f, "Row has {found} values, schema has {expected} columns")
            }
            Self::DuplicateRowKey(key) => write!(f, "Row key {key} already exists"),
            Self::TypeCoercion {
                column,
                row,
                value,
                target,
            } => write!(
                f,
                "Cannot coerce '{value}' in column '{column}' (row {row}) to {target}"
            ),
            Self::UnsupportedType {
                column,
                operation,
                found,
            } => write!(
                f,
                "{operation} does not support column '{column}' of type {found}"
            ),
            Self::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CleanError {}

impl From<polars::error::PolarsError> for CleanError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<serde_json::Error> for CleanError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

/// Result type alias for tabscrub operations.
pub type Result<T> = std::result::Result<T, CleanError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CleanError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: CleanError = e.into();
            CleanError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: CleanError = e.into();
            CleanError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CleanError::UnknownColumn("fund_E".to_owned());
        assert_eq!(err.to_string(), "Unknown column 'fund_E'");
    }

    #[test]
    fn test_coercion_error_names_row_and_target() {
        let err = CleanError::TypeCoercion {
            column: "duration".to_owned(),
            row: RowKey(7),
            value: "twelve".to_owned(),
            target: LogicalType::Integer,
        };
        let msg = err.to_string();
        assert!(msg.contains("twelve"));
        assert!(msg.contains("#7"));
        assert!(msg.contains("integer"));
    }

    #[test]
    fn test_polars_errors_become_data_processing() {
        let err: CleanError =
            polars::error::PolarsError::ColumnNotFound("fund_E".into()).into();
        assert!(matches!(err, CleanError::DataProcessing(msg) if msg.contains("fund_E")));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), serde_json::Error> =
            serde_json::from_str::<()>("{not json");

        let result: Result<()> = result.context("Failed to read config");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config")
        );
    }
}
