//! Export of sort results.
//!
//! CSV and JSON exports for factor returns, portfolio returns,
//! assignments and breakpoints. Records are flat so the CSV and JSON
//! layouts carry the same columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tidysort_sorts::{Assignment, Breakpoints, FactorSeries, PortfolioReturn, SortingVariable};

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer output was not UTF-8.
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty" | "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_records<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn export_records<T: Serialize>(
    records: &[T],
    format: ExportFormat,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => csv_records(records),
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// One factor return in long format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorReturnExport {
    /// Return period.
    pub date: NaiveDate,

    /// Factor name.
    pub factor: String,

    /// Factor return.
    pub value: f64,
}

impl FactorReturnExport {
    /// Flatten factor series into long-format records.
    pub fn from_series(series: &[FactorSeries]) -> Vec<Self> {
        series
            .iter()
            .flat_map(|s| {
                s.points.iter().map(|p| Self {
                    date: p.period,
                    factor: s.name.clone(),
                    value: p.value,
                })
            })
            .collect()
    }
}

impl Exporter for Vec<FactorReturnExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

/// Factor series merged on date, one column per factor.
///
/// Dates present in any series are kept; missing values are empty in CSV
/// and `null` in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorTableExport {
    /// Factor names in column order.
    pub factors: Vec<String>,

    /// Rows ordered by date.
    pub rows: Vec<FactorTableRow>,
}

/// One date of a [`FactorTableExport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorTableRow {
    /// Return period.
    pub date: NaiveDate,

    /// Values in the order of [`FactorTableExport::factors`].
    pub values: Vec<Option<f64>>,
}

impl FactorTableExport {
    /// Outer-merge factor series by date.
    pub fn from_series(series: &[FactorSeries]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (j, s) in series.iter().enumerate() {
            for point in &s.points {
                by_date
                    .entry(point.period)
                    .or_insert_with(|| vec![None; series.len()])[j] = Some(point.value);
            }
        }

        Self {
            factors: series.iter().map(|s| s.name.clone()).collect(),
            rows: by_date
                .into_iter()
                .map(|(date, values)| FactorTableRow { date, values })
                .collect(),
        }
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no dates.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                object.insert("date".into(), serde_json::Value::String(row.date.to_string()));
                for (name, value) in self.factors.iter().zip(&row.values) {
                    object.insert(name.clone(), serde_json::json!(value));
                }
                object
            })
            .collect()
    }
}

impl Exporter for FactorTableExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["date".to_string()];
                header.extend(self.factors.iter().cloned());
                wtr.write_record(&header)?;

                for row in &self.rows {
                    let mut record = vec![row.date.to_string()];
                    record.extend(
                        row.values
                            .iter()
                            .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
                    );
                    wtr.write_record(&record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                Ok(String::from_utf8(bytes)?)
            }
            ExportFormat::Json => Ok(serde_json::to_string(&self.json_rows())?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.json_rows())?),
        }
    }
}

/// Return of one portfolio at one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioReturnExport {
    /// Return period.
    pub date: NaiveDate,

    /// Portfolio labels, e.g. `me=1;bm=3`.
    pub portfolio: String,

    /// Weighted excess return.
    pub ret: f64,

    /// Number of constituents.
    pub n_constituents: usize,
}

fn label_string(labels: impl Iterator<Item = (SortingVariable, u32)>) -> String {
    labels
        .map(|(v, l)| format!("{}={}", v, l))
        .collect::<Vec<_>>()
        .join(";")
}

impl From<&PortfolioReturn> for PortfolioReturnExport {
    fn from(ret: &PortfolioReturn) -> Self {
        Self {
            date: ret.period,
            portfolio: label_string(ret.labels.iter()),
            ret: ret.ret,
            n_constituents: ret.n_constituents,
        }
    }
}

impl Exporter for Vec<PortfolioReturnExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

/// Portfolio membership of one security.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentExport {
    /// CRSP permanent security identifier.
    pub permno: u64,

    /// Sorting date.
    pub date: NaiveDate,

    /// Portfolio labels, e.g. `size=2;bm=1`.
    pub portfolio: String,
}

impl From<&Assignment> for AssignmentExport {
    fn from(assignment: &Assignment) -> Self {
        Self {
            permno: assignment.permno,
            date: assignment.period,
            portfolio: label_string(assignment.labels.iter()),
        }
    }
}

impl Exporter for Vec<AssignmentExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

/// Bounds of one portfolio.
///
/// `None` marks an open bound at either end of the breakpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakpointExport {
    /// Sorting date.
    pub date: NaiveDate,

    /// Sorting variable.
    pub variable: String,

    /// Portfolio label.
    pub portfolio: u32,

    /// Inclusive lower bound.
    pub lower: Option<f64>,

    /// Exclusive upper bound.
    pub upper: Option<f64>,
}

impl BreakpointExport {
    /// One record per portfolio of `breakpoints`.
    pub fn from_breakpoints(
        date: NaiveDate,
        variable: SortingVariable,
        breakpoints: &Breakpoints,
    ) -> Vec<Self> {
        let finite = |b: f64| Some(b).filter(|x| x.is_finite());
        breakpoints
            .boundaries()
            .windows(2)
            .enumerate()
            .map(|(i, w)| Self {
                date,
                variable: variable.to_string(),
                portfolio: (i + 1) as u32,
                lower: finite(w[0]),
                upper: finite(w[1]),
            })
            .collect()
    }
}

impl Exporter for Vec<BreakpointExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tidysort_sorts::{FactorReturn, PortfolioLabels, compute_breakpoints};

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, 1).unwrap()
    }

    fn series(name: &str, points: &[(u32, f64)]) -> FactorSeries {
        FactorSeries::new(
            name,
            points
                .iter()
                .map(|(m, value)| FactorReturn {
                    period: d(*m),
                    value: *value,
                })
                .collect(),
        )
    }

    #[test]
    fn test_factor_returns_csv() {
        let records = FactorReturnExport::from_series(&[series("hml", &[(1, 0.01), (2, -0.02)])]);
        let csv = records.export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,factor,value");
        assert_eq!(lines[1], "2020-01-01,hml,0.01");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_factor_table_outer_merge() {
        let table = FactorTableExport::from_series(&[
            series("smb", &[(1, 0.01), (2, 0.02)]),
            series("rmw", &[(2, 0.03), (3, 0.04)]),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].values, vec![Some(0.01), None]);
        assert_eq!(table.rows[2].values, vec![None, Some(0.04)]);

        let csv = table.export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,smb,rmw");
        assert_eq!(lines[1], "2020-01-01,0.01,");

        let json = table.export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"rmw\":null"));
    }

    #[test]
    fn test_portfolio_return_labels() {
        let labels: PortfolioLabels = [
            (SortingVariable::MarketEquity, 1),
            (SortingVariable::BookToMarket, 3),
        ]
        .into_iter()
        .collect();
        let ret = PortfolioReturn {
            period: d(1),
            labels,
            ret: 0.05,
            n_constituents: 12,
        };

        let records = vec![PortfolioReturnExport::from(&ret)];
        let csv = records.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.contains("me=1;bm=3"));
        assert!(csv.contains("0.05"));
        assert!(csv.contains(",12"));
    }

    #[test]
    fn test_breakpoints_have_open_ends() {
        let breakpoints = compute_breakpoints(&[10.0, 20.0], 2).unwrap();
        let records = BreakpointExport::from_breakpoints(d(6), SortingVariable::Size, &breakpoints);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lower, None);
        assert_eq!(records[0].upper, Some(15.0));
        assert_eq!(records[1].lower, Some(15.0));
        assert_eq!(records[1].upper, None);

        let json = records.export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"lower\":null"));
    }

    #[test]
    fn test_assignments_json() {
        let mut assignment = Assignment::new(10001, d(7));
        assignment.labels.insert(SortingVariable::Size, 2);
        let records = vec![AssignmentExport::from(&assignment)];

        let json = records.export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(json.contains("\"permno\": 10001"));
        assert!(json.contains("size=2"));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty", ExportFormat::PrettyJson)]
    fn test_format_from_str(#[case] text: &str, #[case] expected: ExportFormat) {
        assert_eq!(text.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            "parquet".parse::<ExportFormat>(),
            Err(ExportError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_export_format_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }

    #[test]
    fn test_export_to_file() {
        let records = FactorReturnExport::from_series(&[series("smb", &[(1, 0.01)])]);
        let path = std::env::temp_dir().join("tidysort_export_test.csv");

        records.export_to_file(&path, ExportFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("smb"));

        std::fs::remove_file(path).ok();
    }
}
