//! Portfolio returns.

use crate::error::{Result, SortError};
use crate::observation::{Observation, SortingVariable};
use crate::period::{PeriodPolicy, for_each_period};
use crate::sort::{Assignment, PortfolioLabels};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// How constituents are weighted inside a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// Weight by lagged market capitalization.
    #[default]
    Value,
    /// Equal weights.
    Equal,
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => write!(f, "value-weighted"),
            Self::Equal => write!(f, "equal-weighted"),
        }
    }
}

/// Weighted mean excess return of one portfolio, `Σ(r·w) / Σw`.
///
/// With [`Weighting::Value`] the weight is `mktcap_lag`.
///
/// # Errors
///
/// - [`SortError::InsufficientData`] if the portfolio is empty or its
///   weights sum to zero.
/// - [`SortError::MissingValue`] if a constituent lacks its return or weight.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tidysort_sorts::{Exchange, Observation, Weighting, value_weighted_return};
///
/// let period = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let portfolio = [
///     Observation::new(1, period, Exchange::Nyse).with_return(0.05, 100.0),
///     Observation::new(2, period, Exchange::Nyse).with_return(0.10, 50.0),
/// ];
/// let ret = value_weighted_return(&portfolio, Weighting::Value).unwrap();
/// assert_eq!((ret * 1e4).round() / 1e4, 0.0667);
/// ```
pub fn value_weighted_return<'a, I>(observations: I, weighting: Weighting) -> Result<f64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut n = 0usize;

    for obs in observations {
        let ret = required(obs.ret_excess, obs.permno, "ret_excess")?;
        let weight = match weighting {
            Weighting::Value => required(obs.mktcap_lag, obs.permno, "mktcap_lag")?,
            Weighting::Equal => 1.0,
        };
        weighted += ret * weight;
        total_weight += weight;
        n += 1;
    }

    if n == 0 {
        return Err(SortError::insufficient("empty portfolio"));
    }
    if total_weight == 0.0 {
        return Err(SortError::insufficient(format!(
            "portfolio of {} constituents has zero total weight",
            n
        )));
    }

    Ok(weighted / total_weight)
}

fn required(value: Option<f64>, permno: u64, field: &'static str) -> Result<f64> {
    match value {
        Some(v) if !v.is_nan() => Ok(v),
        _ => Err(SortError::missing(permno, field)),
    }
}

/// Return of one portfolio at one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReturn {
    /// Return period.
    pub period: NaiveDate,
    /// Portfolio labels the return was grouped by.
    pub labels: PortfolioLabels,
    /// Weighted mean excess return.
    pub ret: f64,
    /// Number of constituents.
    pub n_constituents: usize,
}

impl PortfolioReturn {
    /// Label of one grouping variable.
    pub fn label(&self, variable: SortingVariable) -> Option<u32> {
        self.labels.get(variable)
    }
}

/// Weighted returns of every portfolio at every period.
///
/// Assignments are joined onto observations by `(permno, period)`;
/// observations without an assignment are ignored. Portfolios are formed
/// by the labels of the `by` variables, so grouping by a subset of the
/// sorted variables pools the remaining dimensions.
///
/// Output is ordered by period, then by labels.
pub fn portfolio_returns(
    observations: &[Observation],
    assignments: &[Assignment],
    by: &[SortingVariable],
    weighting: Weighting,
    policy: PeriodPolicy,
) -> Result<Vec<PortfolioReturn>> {
    if by.is_empty() {
        return Err(SortError::InvalidConfiguration(
            "portfolio returns need at least one grouping variable".into(),
        ));
    }

    let mut labels_by_key: HashMap<(u64, NaiveDate), PortfolioLabels> =
        HashMap::with_capacity(assignments.len());
    for assignment in assignments {
        let labels = assignment.labels.restrict(by).ok_or_else(|| {
            SortError::InvalidConfiguration(format!(
                "assignment for permno {} at {} lacks labels for {:?}",
                assignment.permno,
                assignment.period,
                by.iter().map(|v| v.name()).collect::<Vec<_>>()
            ))
        })?;
        labels_by_key.insert(assignment.key(), labels);
    }

    let matched: Vec<Observation> = observations
        .iter()
        .filter(|obs| labels_by_key.contains_key(&obs.key()))
        .cloned()
        .collect();
    tracing::debug!(
        observations = observations.len(),
        matched = matched.len(),
        "joined assignments onto observations"
    );

    for_each_period(&matched, policy, |period, cross_section| {
        let mut portfolios: BTreeMap<&PortfolioLabels, Vec<&Observation>> = BTreeMap::new();
        for obs in cross_section {
            if let Some(labels) = labels_by_key.get(&obs.key()) {
                portfolios.entry(labels).or_default().push(obs);
            }
        }

        portfolios
            .into_iter()
            .map(|(labels, members)| {
                Ok(PortfolioReturn {
                    period,
                    labels: labels.clone(),
                    ret: value_weighted_return(members.iter().copied(), weighting)?,
                    n_constituents: members.len(),
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Exchange;
    use approx::assert_relative_eq;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, 1).unwrap()
    }

    fn stock(permno: u64, period: NaiveDate, ret: f64, w: f64) -> Observation {
        Observation::new(permno, period, Exchange::Nyse).with_return(ret, w)
    }

    fn assigned(permno: u64, period: NaiveDate, me: u32, bm: u32) -> Assignment {
        let mut a = Assignment::new(permno, period);
        a.labels.insert(SortingVariable::MarketEquity, me);
        a.labels.insert(SortingVariable::BookToMarket, bm);
        a
    }

    #[test]
    fn test_value_weighted() {
        let obs = [stock(1, d(1), 0.05, 100.0), stock(2, d(1), 0.10, 50.0)];
        let ret = value_weighted_return(&obs, Weighting::Value).unwrap();
        assert_relative_eq!(ret, 0.2 / 3.0, epsilon = 1e-12);

        let ret = value_weighted_return(&obs, Weighting::Equal).unwrap();
        assert_relative_eq!(ret, 0.075, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_portfolio_is_insufficient() {
        let err = value_weighted_return(std::iter::empty(), Weighting::Value).unwrap_err();
        assert!(matches!(err, SortError::InsufficientData { .. }));
    }

    #[test]
    fn test_zero_weight_is_insufficient() {
        let obs = [stock(1, d(1), 0.05, 0.0)];
        let err = value_weighted_return(&obs, Weighting::Value).unwrap_err();
        assert!(matches!(err, SortError::InsufficientData { .. }));
    }

    #[test]
    fn test_missing_weight() {
        let mut obs = stock(9, d(1), 0.05, 1.0);
        obs.mktcap_lag = None;
        let err = value_weighted_return([&obs], Weighting::Value).unwrap_err();
        assert_eq!(err, SortError::missing(9, "mktcap_lag"));
        assert!(value_weighted_return([&obs], Weighting::Equal).is_ok());
    }

    #[test]
    fn test_portfolio_returns_group_and_pool() {
        let observations = vec![
            stock(1, d(1), 0.01, 1.0),
            stock(2, d(1), 0.03, 1.0),
            stock(3, d(1), 0.05, 2.0),
            stock(1, d(2), 0.02, 1.0),
            // no assignment, ignored
            stock(4, d(1), 1.00, 1.0),
        ];
        let assignments = vec![
            assigned(1, d(1), 1, 1),
            assigned(2, d(1), 1, 2),
            assigned(3, d(1), 2, 2),
            assigned(1, d(2), 1, 1),
        ];

        let full = portfolio_returns(
            &observations,
            &assignments,
            &[SortingVariable::MarketEquity, SortingVariable::BookToMarket],
            Weighting::Value,
            PeriodPolicy::Skip,
        )
        .unwrap();
        assert_eq!(full.len(), 4);
        assert!(full.iter().all(|r| r.n_constituents == 1));

        let by_bm = portfolio_returns(
            &observations,
            &assignments,
            &[SortingVariable::BookToMarket],
            Weighting::Value,
            PeriodPolicy::Skip,
        )
        .unwrap();
        assert_eq!(by_bm.len(), 3);
        let pooled = &by_bm[1];
        assert_eq!(pooled.period, d(1));
        assert_eq!(pooled.label(SortingVariable::BookToMarket), Some(2));
        assert_eq!(pooled.n_constituents, 2);
        assert_relative_eq!(pooled.ret, (0.03 + 0.10) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_grouping_variable_must_be_labelled() {
        let observations = vec![stock(1, d(1), 0.01, 1.0)];
        let assignments = vec![assigned(1, d(1), 1, 1)];
        let err = portfolio_returns(
            &observations,
            &assignments,
            &[SortingVariable::Investment],
            Weighting::Value,
            PeriodPolicy::Skip,
        )
        .unwrap_err();
        assert!(matches!(err, SortError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_weight_period_is_skipped() {
        let observations = vec![stock(1, d(1), 0.01, 0.0), stock(1, d(2), 0.02, 1.0)];
        let assignments = vec![assigned(1, d(1), 1, 1), assigned(1, d(2), 1, 1)];
        let returns = portfolio_returns(
            &observations,
            &assignments,
            &[SortingVariable::MarketEquity],
            Weighting::Value,
            PeriodPolicy::Skip,
        )
        .unwrap();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].period, d(2));
    }
}
