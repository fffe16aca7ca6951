//! Long-short factor construction.
//!
//! A factor is the per-period difference between the mean return of the
//! long leg and the mean return of the short leg, where each leg is the set
//! of portfolios carrying one label of a sorting variable. Portfolio returns
//! inside a leg are averaged with equal weights.

use crate::error::{Result, SortError};
use crate::observation::SortingVariable;
use crate::period::PeriodPolicy;
use crate::returns::PortfolioReturn;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which label of the sorting variable forms a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    /// Highest label present in the period.
    Top,
    /// Lowest label present in the period.
    Bottom,
    /// A fixed label.
    Label(u32),
}

impl Leg {
    fn resolve(self, present: &[u32]) -> Option<u32> {
        match self {
            Self::Top => present.iter().copied().max(),
            Self::Bottom => present.iter().copied().min(),
            Self::Label(label) => present.contains(&label).then_some(label),
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
            Self::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Factor return at one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorReturn {
    /// Return period.
    pub period: NaiveDate,
    /// Long-short spread.
    pub value: f64,
}

/// Named time series of factor returns, ordered by period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSeries {
    /// Factor name, e.g. `hml`.
    pub name: String,
    /// One point per period.
    pub points: Vec<FactorReturn>,
}

impl FactorSeries {
    /// Create a series, sorting the points by period.
    pub fn new(name: impl Into<String>, mut points: Vec<FactorReturn>) -> Self {
        points.sort_by_key(|p| p.period);
        Self {
            name: name.into(),
            points,
        }
    }

    /// Number of periods.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no periods.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time-series mean, `None` for an empty series.
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.value).sum::<f64>() / self.points.len() as f64)
    }

    /// Value at one period.
    pub fn get(&self, period: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&period, |p| p.period)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// First and last period.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.points.first()?.period, self.points.last()?.period))
    }
}

fn leg_mean(
    returns: &[&PortfolioReturn],
    variable: SortingVariable,
    leg: Leg,
    present: &[u32],
) -> Result<f64> {
    let label = leg.resolve(present).ok_or_else(|| {
        SortError::insufficient(format!("no {} portfolio for leg {}", variable, leg))
    })?;
    let rets: Vec<f64> = returns
        .iter()
        .filter(|r| r.label(variable) == Some(label))
        .map(|r| r.ret)
        .collect();
    Ok(rets.iter().sum::<f64>() / rets.len() as f64)
}

fn spread(
    returns: &[&PortfolioReturn],
    variable: SortingVariable,
    long: Leg,
    short: Leg,
    present: &[u32],
) -> Result<f64> {
    Ok(leg_mean(returns, variable, long, present)? - leg_mean(returns, variable, short, present)?)
}

/// Long-short spread of portfolio returns on one sorting variable.
///
/// For every period, the mean return of the `long` portfolios minus the
/// mean return of the `short` portfolios. A period missing one of the legs
/// fails with [`SortError::InsufficientData`] and is handled by `policy`.
///
/// # Errors
///
/// [`SortError::InvalidConfiguration`] if a portfolio return is not
/// labelled for `variable`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tidysort_sorts::{Leg, PeriodPolicy, PortfolioReturn, SortingVariable, long_short};
///
/// let period = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let returns: Vec<PortfolioReturn> = [(1, 0.02), (2, 0.03), (3, 0.07)]
///     .into_iter()
///     .map(|(label, ret)| PortfolioReturn {
///         period,
///         labels: [(SortingVariable::BookToMarket, label)].into_iter().collect(),
///         ret,
///         n_constituents: 1,
///     })
///     .collect();
///
/// let hml = long_short(&returns, SortingVariable::BookToMarket, Leg::Top, Leg::Bottom, PeriodPolicy::Skip).unwrap();
/// assert!((hml[0].value - 0.05).abs() < 1e-12);
/// ```
pub fn long_short(
    returns: &[PortfolioReturn],
    variable: SortingVariable,
    long: Leg,
    short: Leg,
    policy: PeriodPolicy,
) -> Result<Vec<FactorReturn>> {
    let mut by_period: BTreeMap<NaiveDate, Vec<&PortfolioReturn>> = BTreeMap::new();
    for ret in returns {
        if ret.label(variable).is_none() {
            return Err(SortError::InvalidConfiguration(format!(
                "portfolio return at {} is not labelled for {}",
                ret.period, variable
            )));
        }
        by_period.entry(ret.period).or_default().push(ret);
    }

    let mut out = Vec::with_capacity(by_period.len());
    for (period, rets) in by_period {
        let present: Vec<u32> = rets.iter().filter_map(|r| r.label(variable)).collect();
        let outcome = spread(&rets, variable, long, short, &present);
        if let Some(value) = policy.handle(period, outcome)? {
            out.push(FactorReturn { period, value });
        }
    }

    tracing::debug!(%variable, %long, %short, periods = out.len(), "built long-short factor");
    Ok(out)
}
