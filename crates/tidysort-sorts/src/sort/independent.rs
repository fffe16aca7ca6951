//! Independent sorts.

use super::{Assignment, SortSpec, validate_specs};
use crate::assign::assign_portfolio;
use crate::breakpoints::Breakpoints;
use crate::error::{Result, SortError};
use crate::observation::Observation;
use crate::period::single_period;

/// Breakpoints of one spec over a cross-section.
///
/// Only observations in the spec's reference universe contribute; every
/// one of them must carry the sorting variable.
pub fn cross_section_breakpoints(
    observations: &[&Observation],
    spec: &SortSpec,
) -> Result<Breakpoints> {
    let reference = observations
        .iter()
        .filter(|obs| spec.reference.contains(obs))
        .map(|obs| spec.variable.require(obs))
        .collect::<Result<Vec<f64>>>()?;

    if reference.is_empty() {
        return Err(SortError::insufficient(format!(
            "no {} observations to compute {} breakpoints",
            spec.reference, spec.variable
        )));
    }

    spec.rule.compute(&reference)
}

/// Label every observation with the breakpoints of one spec.
pub(crate) fn label_refs(observations: &[&Observation], spec: &SortSpec) -> Result<Vec<u32>> {
    let breakpoints = cross_section_breakpoints(observations, spec)?;
    let values = observations
        .iter()
        .map(|obs| spec.variable.require(obs))
        .collect::<Result<Vec<f64>>>()?;
    tracing::trace!(
        variable = %spec.variable,
        portfolios = breakpoints.n_portfolios(),
        n = values.len(),
        "assigning portfolios"
    );
    assign_portfolio(&values, &breakpoints)
}

pub(crate) fn sort_refs(observations: &[&Observation], specs: &[SortSpec]) -> Result<Vec<Assignment>> {
    if single_period(observations)?.is_none() {
        return Ok(Vec::new());
    }

    let mut assignments: Vec<Assignment> = observations
        .iter()
        .map(|obs| Assignment::new(obs.permno, obs.period))
        .collect();

    for spec in specs {
        let labels = label_refs(observations, spec)?;
        for (assignment, label) in assignments.iter_mut().zip(labels) {
            assignment.labels.insert(spec.variable, label);
        }
    }

    Ok(assignments)
}

/// Sort one period's cross-section on several variables independently.
///
/// Each variable's breakpoints come from its own reference universe over
/// the whole cross-section, and all observations (not only the reference
/// subset) are assigned. The result has one [`Assignment`] per observation,
/// in input order, labelled for every spec.
///
/// # Errors
///
/// - [`SortError::InvalidConfiguration`] for an empty spec list, a
///   variable listed twice, an invalid rule, or observations from more
///   than one period.
/// - [`SortError::InsufficientData`] if a reference universe is empty.
/// - [`SortError::MissingValue`] if an observation lacks a sorting variable.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tidysort_sorts::{Exchange, Observation, SortSpec, SortingVariable, independent_sort};
///
/// let period = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let observations: Vec<Observation> = [(1, 10.0), (2, 20.0), (3, 15.0)]
///     .into_iter()
///     .map(|(permno, me)| {
///         Observation::new(permno, period, Exchange::Nyse).with(SortingVariable::MarketEquity, me)
///     })
///     .collect();
///
/// let spec = SortSpec::quantiles(SortingVariable::MarketEquity, 2);
/// let assignments = independent_sort(&observations, &[spec]).unwrap();
/// let labels: Vec<u32> = assignments
///     .iter()
///     .filter_map(|a| a.label(SortingVariable::MarketEquity))
///     .collect();
/// assert_eq!(labels, vec![1, 2, 2]);
/// ```
pub fn independent_sort(observations: &[Observation], specs: &[SortSpec]) -> Result<Vec<Assignment>> {
    validate_specs(specs)?;
    let refs: Vec<&Observation> = observations.iter().collect();
    sort_refs(&refs, specs)
}
