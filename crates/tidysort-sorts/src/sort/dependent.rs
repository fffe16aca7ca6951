//! Dependent (nested) sorts.

use super::independent::label_refs;
use super::{Assignment, SortSpec, validate_specs};
use crate::error::{Result, SortError};
use crate::observation::Observation;
use crate::period::single_period;
use std::collections::BTreeMap;

pub(crate) fn sort_refs(
    observations: &[&Observation],
    primary: &SortSpec,
    secondaries: &[SortSpec],
) -> Result<Vec<Assignment>> {
    if single_period(observations)?.is_none() {
        return Ok(Vec::new());
    }

    let primary_labels = label_refs(observations, primary)?;

    let mut assignments: Vec<Assignment> = observations
        .iter()
        .zip(&primary_labels)
        .map(|(obs, label)| {
            let mut assignment = Assignment::new(obs.permno, obs.period);
            assignment.labels.insert(primary.variable, *label);
            assignment
        })
        .collect();

    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, label) in primary_labels.iter().enumerate() {
        groups.entry(*label).or_default().push(idx);
    }

    for (group, members) in &groups {
        let group_refs: Vec<&Observation> = members.iter().map(|i| observations[*i]).collect();

        for secondary in secondaries {
            let labels = label_refs(&group_refs, secondary).map_err(|err| match err {
                SortError::InsufficientData { context, period } => SortError::InsufficientData {
                    context: format!("{} within {} group {}", context, primary.variable, group),
                    period,
                },
                other => other,
            })?;

            for (idx, label) in members.iter().zip(labels) {
                assignments[*idx].labels.insert(secondary.variable, label);
            }
        }
    }

    Ok(assignments)
}

/// Sort on `primary`, then on `secondary` within each primary group.
///
/// The secondary breakpoints are recomputed from the reference universe
/// of every primary group separately. Assignments are returned in input
/// order and carry labels for both variables.
///
/// # Errors
///
/// As [`independent_sort`](super::independent_sort). A primary group
/// without reference observations for the secondary variable fails the
/// whole period with [`SortError::InsufficientData`].
pub fn dependent_sort(
    observations: &[Observation],
    primary: &SortSpec,
    secondary: &SortSpec,
) -> Result<Vec<Assignment>> {
    dependent_sort_many(observations, primary, std::slice::from_ref(secondary))
}

/// Dependent sort with several secondary variables.
///
/// Each secondary variable is sorted within the primary groups on its
/// own, so the secondaries do not condition on each other.
pub fn dependent_sort_many(
    observations: &[Observation],
    primary: &SortSpec,
    secondaries: &[SortSpec],
) -> Result<Vec<Assignment>> {
    if secondaries.is_empty() {
        return Err(SortError::InvalidConfiguration(
            "dependent sort needs at least one secondary variable".into(),
        ));
    }
    validate_specs(std::iter::once(primary).chain(secondaries))?;
    let refs: Vec<&Observation> = observations.iter().collect();
    sort_refs(&refs, primary, secondaries)
}
