//! Error types for portfolio sorts.

use crate::observation::SortingVariable;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Result type for sort operations.
pub type Result<T> = std::result::Result<T, SortError>;

/// Where a missing value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLocation {
    /// An observation of this security.
    Permno(u64),
    /// Position in a plain slice of values.
    Index(usize),
}

impl fmt::Display for ValueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permno(permno) => write!(f, "permno {}", permno),
            Self::Index(index) => write!(f, "position {}", index),
        }
    }
}

/// Errors that can occur while computing breakpoints, assignments or returns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SortError {
    /// Reference universe or portfolio is empty for a period.
    #[error("Insufficient data: {context}")]
    InsufficientData {
        /// What was empty.
        context: String,
        /// Period the failure belongs to, when known.
        period: Option<NaiveDate>,
    },

    /// Sort configuration is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An observation or input value lacks a value required by the operation.
    #[error("Missing {field} for {location}")]
    MissingValue {
        /// Observation or slice position of the offending value.
        location: ValueLocation,
        /// Name of the missing field.
        field: &'static str,
    },
}

impl SortError {
    /// Shorthand for [`SortError::InsufficientData`] without a period.
    pub fn insufficient(context: impl Into<String>) -> Self {
        Self::InsufficientData {
            context: context.into(),
            period: None,
        }
    }

    /// Missing value of a sorting variable.
    pub const fn missing_variable(permno: u64, variable: SortingVariable) -> Self {
        Self::missing(permno, variable.name())
    }

    /// Missing field of an observation.
    pub const fn missing(permno: u64, field: &'static str) -> Self {
        Self::MissingValue {
            location: ValueLocation::Permno(permno),
            field,
        }
    }

    /// NaN at a position of a plain value slice.
    pub const fn missing_at(index: usize, field: &'static str) -> Self {
        Self::MissingValue {
            location: ValueLocation::Index(index),
            field,
        }
    }

    /// Attach a period to an [`SortError::InsufficientData`] error.
    ///
    /// Other variants are returned unchanged.
    pub fn in_period(self, date: NaiveDate) -> Self {
        match self {
            Self::InsufficientData { context, period } => Self::InsufficientData {
                context,
                period: period.or(Some(date)),
            },
            other => other,
        }
    }

    /// Whether a per-period orchestration loop may skip this error.
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
