//! Studies built on portfolio sorts.
//!
//! Each study takes typed panels or records, runs its sorts and returns
//! factor series with the assignments behind them; printing and exporting is left to the caller.

pub mod bivariate;
pub mod fama_french;

pub use bivariate::{BivariateConfig, SortKind, ValuePremium, breakpoints_at, value_premium};
pub use fama_french::{
    FamaFrenchConfig, Replication, compare_with_published, published_series, replicate_ff3,
    replicate_ff5,
};
