#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tidysort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;

pub use export::{
    AssignmentExport, BreakpointExport, ExportError, ExportFormat, Exporter, FactorReturnExport,
    FactorTableExport, FactorTableRow, PortfolioReturnExport,
};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{
    FactorComparison, FactorSummary, ReplicationSummary, pearson_correlation, round_to,
};
