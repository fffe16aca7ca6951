//! Integration tests for exports and summaries of a factor study.

use chrono::NaiveDate;
use tidysort_output::{
    ExportFormat, Exporter, FactorComparison, FactorReturnExport, FactorSummary,
    FactorTableExport, ReplicationSummary, ReportBuilder,
};
use tidysort_sorts::{FactorReturn, FactorSeries};

fn series(name: &str, values: &[f64]) -> FactorSeries {
    FactorSeries::new(
        name,
        values
            .iter()
            .enumerate()
            .map(|(i, value)| FactorReturn {
                period: NaiveDate::from_ymd_opt(2021, i as u32 + 1, 1).unwrap(),
                value: *value,
            })
            .collect(),
    )
}

#[test]
fn test_full_replication_workflow() {
    let replicated = vec![
        series("smb", &[0.010, -0.004, 0.021, 0.003]),
        series("hml", &[-0.012, 0.008, 0.015, -0.002]),
    ];
    let published = vec![
        series("smb", &[0.011, -0.005, 0.020, 0.004]),
        series("hml", &[-0.010, 0.009, 0.016, -0.001]),
    ];

    let comparisons: Vec<FactorComparison> = replicated
        .iter()
        .zip(&published)
        .map(|(r, p)| FactorComparison::new(r, p, 4))
        .collect();
    let summary = ReplicationSummary::new("Fama-French 3".to_string(), comparisons);

    for comparison in &summary.comparisons {
        assert_eq!(comparison.n_overlap, 4);
        assert!(comparison.correlation.unwrap() > 0.9);
    }

    let ascii = summary.to_ascii_table();
    assert!(ascii.contains("smb"));
    assert!(ascii.contains("hml"));

    let stats: Vec<FactorSummary> = replicated.iter().map(FactorSummary::from_series).collect();
    let markdown = FactorSummary::table_to_markdown(&stats);
    assert!(markdown.contains("| smb | 4 |"));

    let report = ReportBuilder::new()
        .study("ff3")
        .contents(&summary)
        .unwrap()
        .build()
        .unwrap();
    assert!(report.to_json().unwrap().contains("\"correlation\""));
}

#[test]
fn test_long_and_wide_exports_agree() {
    let factors = vec![series("smb", &[0.01, 0.02]), series("hml", &[0.03])];

    let long = FactorReturnExport::from_series(&factors);
    assert_eq!(long.len(), 3);

    let wide = FactorTableExport::from_series(&factors);
    assert_eq!(wide.len(), 2);

    let csv = wide.export_to_string(ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["date,smb,hml", "2021-01-01,0.01,0.03", "2021-02-01,0.02,"]);

    let json = long.export_to_string(ExportFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
}
