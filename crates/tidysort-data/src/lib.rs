#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tidysort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod error;
pub mod ingest;
pub mod panel;
pub mod store;

pub use error::{DataError, Result};
pub use ingest::{
    Compustat, CrspMonthly, PublishedFactors, compustat_from_frame, crsp_monthly_from_frame,
    factors_from_frame,
};
pub use panel::{
    AnnualPanelConfig, MonthlyPanelConfig, assignments_for_returns, build_annual_panel,
    build_monthly_panel, monthly_returns,
};
pub use store::{FactorTable, PermnoCount, TableInfo, TidyFinanceDb};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
