//! Typed observations and sorting variables.
//!
//! An [`Observation`] is one security at one period. Optional fields are
//! `None` when the value is unavailable; they are never coerced to a
//! sentinel number. Use [`complete_cases`] to drop incomplete observations
//! before sorting.

use crate::error::SortError;
use crate::returns::Weighting;
use crate::universe::Exchange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characteristic a cross-section can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortingVariable {
    /// Market capitalization at portfolio formation (June for annual sorts)
    Size,
    /// Market equity (lagged market capitalization)
    MarketEquity,
    /// Book equity over market equity
    BookToMarket,
    /// Operating profitability
    OperatingProfitability,
    /// Asset growth
    Investment,
}

impl SortingVariable {
    /// Returns all sorting variables.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Size,
            Self::MarketEquity,
            Self::BookToMarket,
            Self::OperatingProfitability,
            Self::Investment,
        ]
    }

    /// Short column name of the variable.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::MarketEquity => "me",
            Self::BookToMarket => "bm",
            Self::OperatingProfitability => "op",
            Self::Investment => "inv",
        }
    }

    /// Read the variable from an observation.
    pub const fn value(&self, observation: &Observation) -> Option<f64> {
        match self {
            Self::Size => observation.size,
            Self::MarketEquity => observation.me,
            Self::BookToMarket => observation.bm,
            Self::OperatingProfitability => observation.op,
            Self::Investment => observation.inv,
        }
    }

    /// Read the variable, failing with [`SortError::MissingValue`] when absent.
    pub fn require(&self, observation: &Observation) -> Result<f64, SortError> {
        match self.value(observation) {
            Some(v) if !v.is_nan() => Ok(v),
            _ => Err(SortError::missing_variable(observation.permno, *self)),
        }
    }
}

impl fmt::Display for SortingVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SortingVariable {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|v| v.name() == s.trim())
            .ok_or_else(|| {
                SortError::InvalidConfiguration(format!("Unknown sorting variable: {}", s))
            })
    }
}

/// One security at one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// CRSP permanent security identifier.
    pub permno: u64,
    /// Period key (month start or formation date).
    pub period: NaiveDate,
    /// Primary listing exchange.
    pub exchange: Exchange,
    /// Excess return over the risk-free rate.
    pub ret_excess: Option<f64>,
    /// Market capitalization of the previous month, used as weight.
    pub mktcap_lag: Option<f64>,
    /// Market capitalization at formation.
    pub size: Option<f64>,
    /// Market equity.
    pub me: Option<f64>,
    /// Book-to-market ratio.
    pub bm: Option<f64>,
    /// Operating profitability.
    pub op: Option<f64>,
    /// Investment (asset growth).
    pub inv: Option<f64>,
}

impl Observation {
    /// Create an observation with no values set.
    pub const fn new(permno: u64, period: NaiveDate, exchange: Exchange) -> Self {
        Self {
            permno,
            period,
            exchange,
            ret_excess: None,
            mktcap_lag: None,
            size: None,
            me: None,
            bm: None,
            op: None,
            inv: None,
        }
    }

    /// Set the excess return and its weight.
    pub const fn with_return(mut self, ret_excess: f64, mktcap_lag: f64) -> Self {
        self.ret_excess = Some(ret_excess);
        self.mktcap_lag = Some(mktcap_lag);
        self
    }

    /// Set one sorting variable.
    pub fn with(mut self, variable: SortingVariable, value: f64) -> Self {
        let slot = match variable {
            SortingVariable::Size => &mut self.size,
            SortingVariable::MarketEquity => &mut self.me,
            SortingVariable::BookToMarket => &mut self.bm,
            SortingVariable::OperatingProfitability => &mut self.op,
            SortingVariable::Investment => &mut self.inv,
        };
        *slot = Some(value);
        self
    }

    /// Key used to join assignments back onto observations.
    pub const fn key(&self) -> (u64, NaiveDate) {
        (self.permno, self.period)
    }
}

fn present(value: Option<f64>) -> bool {
    value.is_some_and(|v| !v.is_nan())
}

/// Keep only observations carrying every listed variable.
///
/// With `weighting` set, the return (and for value weights the lagged
/// market cap) is required as well.
pub fn complete_cases(
    observations: &[Observation],
    variables: &[SortingVariable],
    weighting: Option<Weighting>,
) -> Vec<Observation> {
    let kept: Vec<Observation> = observations
        .iter()
        .filter(|obs| variables.iter().all(|v| present(v.value(obs))))
        .filter(|obs| match weighting {
            None => true,
            Some(Weighting::Equal) => present(obs.ret_excess),
            Some(Weighting::Value) => present(obs.ret_excess) && present(obs.mktcap_lag),
        })
        .cloned()
        .collect();

    let dropped = observations.len() - kept.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = kept.len(), "filtered incomplete observations");
    }

    kept
}
