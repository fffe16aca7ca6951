//! Bucketing values against breakpoints.

use crate::breakpoints::Breakpoints;
use crate::error::{Result, SortError};

/// Assign each value the 1-based index of the interval containing it.
///
/// Intervals are `[b[i-1], b[i])`. The lowest value is always included in
/// portfolio 1, and labels lie in `[1, breakpoints.n_portfolios()]`.
///
/// # Errors
///
/// Returns [`SortError::MissingValue`] if a value is NaN. Filter
/// observations lacking the sorting variable before calling this.
///
/// # Examples
///
/// ```
/// use tidysort_sorts::{assign_portfolio, compute_breakpoints};
///
/// let breakpoints = compute_breakpoints(&[10.0, 20.0], 2).unwrap();
/// let labels = assign_portfolio(&[10.0, 20.0, 15.0], &breakpoints).unwrap();
/// assert_eq!(labels, vec![1, 2, 2]);
/// ```
pub fn assign_portfolio(values: &[f64], breakpoints: &Breakpoints) -> Result<Vec<u32>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if v.is_nan() {
                Err(SortError::missing_at(i, "sorting value"))
            } else {
                Ok(breakpoints.label(*v))
            }
        })
        .collect()
}
