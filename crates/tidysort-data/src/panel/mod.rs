//! Sorting panels built from CRSP and Compustat records.
//!
//! - [`monthly`]: monthly rebalanced panel with lagged market equity and
//!   forward-filled book-to-market
//! - [`annual`]: July formation panel for Fama-French factors

pub mod annual;
pub mod monthly;

pub use annual::{
    AnnualPanelConfig, assignments_for_returns, build_annual_panel, monthly_returns,
};
pub use monthly::{MonthlyPanelConfig, build_monthly_panel};
