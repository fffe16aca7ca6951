#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tidysort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod study;

// Re-export main types from sub-crates
pub use tidysort_data as data;
pub use tidysort_output as output;
pub use tidysort_sorts as sorts;

pub use error::{Result, StudyError};
pub use study::{
    BivariateConfig, FamaFrenchConfig, Replication, SortKind, ValuePremium,
    compare_with_published, replicate_ff3, replicate_ff5, value_premium,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
