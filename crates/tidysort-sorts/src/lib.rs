#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tidysort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assign;
pub mod breakpoints;
pub mod error;
pub mod factor;
pub mod observation;
pub mod period;
pub mod registry;
pub mod returns;
pub mod sort;
pub mod universe;

pub use assign::assign_portfolio;
pub use breakpoints::{
    BreakpointRule, Breakpoints, compute_breakpoints, compute_percentile_breakpoints,
};
pub use error::{Result, SortError, ValueLocation};
pub use factor::{FactorReturn, FactorSeries, Leg, long_short};
pub use observation::{Observation, SortingVariable, complete_cases};
pub use period::{PeriodPolicy, for_each_period, group_by_period};
pub use returns::{PortfolioReturn, Weighting, portfolio_returns, value_weighted_return};
pub use sort::{
    Assignment, PortfolioLabels, SortMethod, SortSpec, dependent_sort, dependent_sort_many,
    independent_sort, sort_panel,
};
pub use universe::{Exchange, ReferenceUniverse};

// Re-export registry types for convenience
pub use registry::{FactorCategory, FactorInfo, available_factors, get_factor_info};
