//! Bivariate size and book-to-market sorts.
//!
//! Stocks are sorted into quintiles of lagged market equity and of
//! book-to-market, either independently or with book-to-market breakpoints
//! computed within each size group. The value premium is the return of
//! the highest book-to-market portfolios minus the lowest, averaged across
//! size portfolios.

use crate::error::{Result, StudyError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tidysort_sorts::sort::cross_section_breakpoints;
use tidysort_sorts::{
    Assignment, BreakpointRule, Breakpoints, FactorSeries, Leg, Observation, PeriodPolicy,
    PortfolioReturn, ReferenceUniverse, SortMethod, SortSpec, SortingVariable, Weighting,
    complete_cases, long_short, portfolio_returns, sort_panel,
};

/// How the second variable's breakpoints relate to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKind {
    /// Both variables use breakpoints over the whole cross-section.
    #[default]
    Independent,
    /// Book-to-market breakpoints are computed within each size group.
    Dependent,
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Independent => write!(f, "independent"),
            Self::Dependent => write!(f, "dependent"),
        }
    }
}

impl FromStr for SortKind {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(Self::Independent),
            "dependent" => Ok(Self::Dependent),
            other => Err(StudyError::InvalidConfiguration(format!(
                "unknown sort method: {}",
                other
            ))),
        }
    }
}

/// Settings of the bivariate study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BivariateConfig {
    /// Independent or dependent sort
    pub method: SortKind,
    /// Portfolios per variable
    pub n_portfolios: u32,
    /// Universe the breakpoints are computed on
    pub reference: ReferenceUniverse,
    /// Return weighting within portfolios
    pub weighting: Weighting,
    /// Handling of periods with too little data
    pub policy: PeriodPolicy,
}

impl Default for BivariateConfig {
    fn default() -> Self {
        Self {
            method: SortKind::Independent,
            n_portfolios: 5,
            reference: ReferenceUniverse::nyse(),
            weighting: Weighting::Value,
            policy: PeriodPolicy::Skip,
        }
    }
}

impl BivariateConfig {
    fn spec(&self, variable: SortingVariable) -> SortSpec {
        SortSpec::new(variable, BreakpointRule::Quantiles(self.n_portfolios))
            .with_reference(self.reference.clone())
    }

    /// Sort method for market equity and book-to-market.
    pub fn sort_method(&self) -> SortMethod {
        let me = self.spec(SortingVariable::MarketEquity);
        let bm = self.spec(SortingVariable::BookToMarket);
        match self.method {
            SortKind::Independent => SortMethod::Independent(vec![me, bm]),
            SortKind::Dependent => SortMethod::Dependent {
                primary: me,
                secondaries: vec![bm],
            },
        }
    }
}

/// Result of the bivariate study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePremium {
    /// Method the portfolios were formed with
    pub method: SortKind,
    /// Portfolio labels of every stock at every period
    pub assignments: Vec<Assignment>,
    /// Return of every `(me, bm)` portfolio at every period
    pub portfolio_returns: Vec<PortfolioReturn>,
    /// Top minus bottom book-to-market return per period
    pub premium: FactorSeries,
}

impl ValuePremium {
    /// Time-series mean of the premium.
    pub fn mean(&self) -> Option<f64> {
        self.premium.mean()
    }
}

/// Run the bivariate sort on a monthly panel and compute the value premium.
///
/// Rows lacking `me`, `bm`, the return or (for value weights) the lagged
/// market cap are dropped first. Each period is sorted on `me` and `bm`.
/// Portfolio returns
/// are weighted by lagged market cap. The premium at a period is the mean
/// return of the top `bm` portfolios minus the mean of the bottom ones,
/// each averaged over the `me` portfolios.
pub fn value_premium(panel: &[Observation], config: &BivariateConfig) -> Result<ValuePremium> {
    let method = config.sort_method();
    let variables = [SortingVariable::MarketEquity, SortingVariable::BookToMarket];
    let panel = complete_cases(panel, &variables, Some(config.weighting));
    tracing::info!(
        method = %config.method,
        n_portfolios = config.n_portfolios,
        reference = %config.reference,
        observations = panel.len(),
        "running bivariate sort"
    );

    let assignments = sort_panel(&panel, &method, config.policy)?;
    let returns = portfolio_returns(
        &panel,
        &assignments,
        &variables,
        config.weighting,
        config.policy,
    )?;
    let premium = long_short(
        &returns,
        SortingVariable::BookToMarket,
        Leg::Top,
        Leg::Bottom,
        config.policy,
    )?;

    let premium = FactorSeries::new(format!("value_premium_{}", config.method), premium);
    tracing::info!(
        periods = premium.len(),
        mean = premium.mean().unwrap_or(f64::NAN),
        "value premium computed"
    );

    Ok(ValuePremium {
        method: config.method,
        assignments,
        portfolio_returns: returns,
        premium,
    })
}

/// Breakpoints of one variable at one period of a panel.
///
/// # Errors
///
/// [`tidysort_sorts::SortError::InsufficientData`] if the period has no
/// observation in the reference universe.
pub fn breakpoints_at(
    panel: &[Observation],
    variable: SortingVariable,
    period: NaiveDate,
    n_portfolios: u32,
    reference: ReferenceUniverse,
) -> Result<Breakpoints> {
    let spec =
        SortSpec::new(variable, BreakpointRule::Quantiles(n_portfolios)).with_reference(reference);
    spec.validate()?;

    let cross_section: Vec<&Observation> = panel.iter().filter(|o| o.period == period).collect();
    Ok(cross_section_breakpoints(&cross_section, &spec)?)
}
