//! JSON run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required field was not set on the builder.
    #[error("Missing report field: {0}")]
    MissingField(&'static str),
}

/// Record of one study run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Study that produced the report, e.g. `ff3`.
    pub study: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Configuration the study ran with.
    pub config: serde_json::Value,

    /// Study results.
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report stamped with the current time.
    pub fn new(study: String, config: serde_json::Value, contents: serde_json::Value) -> Self {
        Self {
            study,
            timestamp: Utc::now(),
            config,
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    study: Option<String>,
    config: Option<serde_json::Value>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the study name.
    pub fn study(mut self, study: impl Into<String>) -> Self {
        self.study = Some(study.into());
        self
    }

    /// Set the configuration from any serializable value.
    pub fn config<T: Serialize>(mut self, config: &T) -> Result<Self, ReportError> {
        self.config = Some(serde_json::to_value(config)?);
        Ok(self)
    }

    /// Set the report contents from any serializable value.
    pub fn contents<T: Serialize>(mut self, contents: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(contents)?);
        Ok(self)
    }

    /// Build the report.
    ///
    /// # Errors
    ///
    /// [`ReportError::MissingField`] if no study name was set.
    pub fn build(self) -> Result<Report, ReportError> {
        Ok(Report::new(
            self.study.ok_or(ReportError::MissingField("study"))?,
            self.config.unwrap_or(serde_json::Value::Null),
            self.contents.unwrap_or(serde_json::Value::Null),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = Report::new(
            "ff3".to_string(),
            serde_json::json!({"size_percentile": 0.5}),
            serde_json::json!({"smb": 0.002}),
        );

        assert_eq!(report.study, "ff3");
        assert!(report.to_json().unwrap().contains("\"smb\": 0.002"));
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .study("bivariate")
            .config(&serde_json::json!({"n_portfolios": 5}))
            .unwrap()
            .contents(&[0.01, 0.02])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(report.study, "bivariate");
        assert_eq!(report.config["n_portfolios"], 5);
        assert_eq!(report.contents[1], 0.02);
    }

    #[test]
    fn test_builder_requires_study() {
        let err = ReportBuilder::new().build().unwrap_err();
        assert!(matches!(err, ReportError::MissingField("study")));
    }
}
