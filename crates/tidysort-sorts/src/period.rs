//! Per-period orchestration.
//!
//! Every period is sorted independently of every other period. The loop
//! visits periods in ascending order and a [`PeriodPolicy`] decides what
//! happens when a period has too little data.

use crate::error::{Result, SortError};
use crate::observation::Observation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do when a period fails with [`SortError::InsufficientData`].
///
/// Configuration and missing-value errors always propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodPolicy {
    /// Log a warning and leave the period out of the result.
    #[default]
    Skip,
    /// Stop and return the error.
    Abort,
}

impl PeriodPolicy {
    /// Apply the policy to the outcome of one period.
    ///
    /// Returns `Ok(None)` for a skipped period.
    pub fn handle<T>(self, period: NaiveDate, outcome: Result<T>) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) if self == Self::Skip && err.is_skippable() => {
                tracing::warn!(%period, error = %err, "skipping period");
                Ok(None)
            }
            Err(err) => Err(err.in_period(period)),
        }
    }
}

/// Group observations by period, in ascending period order.
pub fn group_by_period(observations: &[Observation]) -> BTreeMap<NaiveDate, Vec<&Observation>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.period).or_default().push(obs);
    }
    groups
}

/// Run `f` on each period's cross-section and concatenate the results.
pub fn for_each_period<T, F>(
    observations: &[Observation],
    policy: PeriodPolicy,
    mut f: F,
) -> Result<Vec<T>>
where
    F: FnMut(NaiveDate, &[&Observation]) -> Result<Vec<T>>,
{
    let groups = group_by_period(observations);
    let total = groups.len();
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for (period, cross_section) in groups {
        match policy.handle(period, f(period, &cross_section))? {
            Some(values) => out.extend(values),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::info!(skipped, total, "periods skipped for insufficient data");
    }

    Ok(out)
}

/// Check that a cross-section belongs to a single period.
pub(crate) fn single_period(observations: &[&Observation]) -> Result<Option<NaiveDate>> {
    let mut periods = observations.iter().map(|o| o.period);
    let Some(first) = periods.next() else {
        return Ok(None);
    };
    if let Some(other) = periods.find(|p| *p != first) {
        return Err(SortError::InvalidConfiguration(format!(
            "cross-section mixes periods {} and {}",
            first, other
        )));
    }
    Ok(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Exchange;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_group_by_period_is_ordered() {
        let obs = vec![
            Observation::new(1, d(2020, 3), Exchange::Nyse),
            Observation::new(2, d(2020, 1), Exchange::Nyse),
            Observation::new(3, d(2020, 3), Exchange::Nasdaq),
        ];
        let groups = group_by_period(&obs);
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec![d(2020, 1), d(2020, 3)]);
        assert_eq!(groups[&d(2020, 3)].len(), 2);
    }

    #[test]
    fn test_skip_policy_drops_insufficient_periods() {
        let outcome: Result<u32> = Err(SortError::insufficient("empty"));
        assert_eq!(PeriodPolicy::Skip.handle(d(2020, 1), outcome).unwrap(), None);
    }

    #[test]
    fn test_abort_policy_propagates_with_period() {
        let outcome: Result<u32> = Err(SortError::insufficient("empty"));
        let err = PeriodPolicy::Abort.handle(d(2020, 1), outcome).unwrap_err();
        assert_eq!(
            err,
            SortError::InsufficientData {
                context: "empty".into(),
                period: Some(d(2020, 1)),
            }
        );
    }

    #[test]
    fn test_skip_policy_keeps_configuration_errors() {
        let outcome: Result<u32> = Err(SortError::InvalidConfiguration("bad".into()));
        assert!(PeriodPolicy::Skip.handle(d(2020, 1), outcome).is_err());
    }

    #[test]
    fn test_for_each_period() {
        let obs = vec![
            Observation::new(1, d(2020, 1), Exchange::Nyse),
            Observation::new(2, d(2020, 2), Exchange::Nyse),
            Observation::new(3, d(2020, 2), Exchange::Nyse),
        ];

        let counts = for_each_period(&obs, PeriodPolicy::Skip, |period, xs| {
            if period == d(2020, 1) {
                Err(SortError::insufficient("too small"))
            } else {
                Ok(vec![xs.len()])
            }
        })
        .unwrap();
        assert_eq!(counts, vec![2]);
    }

    #[test]
    fn test_single_period() {
        let a = Observation::new(1, d(2020, 1), Exchange::Nyse);
        let b = Observation::new(2, d(2020, 2), Exchange::Nyse);
        assert_eq!(single_period(&[]).unwrap(), None);
        assert_eq!(single_period(&[&a]).unwrap(), Some(d(2020, 1)));
        assert!(single_period(&[&a, &b]).is_err());
    }
}
