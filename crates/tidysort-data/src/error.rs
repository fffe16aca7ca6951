//! Error types for data operations.

use thiserror::Error;
use tidysort_sorts::SortError;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading data or building panels.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A frame or table lacks a required column
    #[error("Missing column {column} in {table}")]
    MissingColumn {
        /// Table or frame name
        table: String,
        /// Column that was looked up
        column: String,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sorting error
    #[error(transparent)]
    Sort(#[from] SortError),
}

impl DataError {
    /// Shorthand for [`DataError::MissingColumn`].
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}
