//! Error types for studies.

use thiserror::Error;
use tidysort_data::DataError;
use tidysort_output::{ExportError, ReportError};
use tidysort_sorts::SortError;

/// Result type for studies.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Errors that can occur while running a study.
#[derive(Debug, Error)]
pub enum StudyError {
    /// Sorting error
    #[error(transparent)]
    Sort(#[from] SortError),

    /// Data error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Export error
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Report error
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Invalid study configuration
    #[error("Invalid study configuration: {0}")]
    InvalidConfiguration(String),
}
