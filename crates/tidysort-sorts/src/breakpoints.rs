//! Breakpoint computation.
//!
//! Breakpoints are quantiles of a sorting variable over the reference
//! universe, computed with linear interpolation between order statistics.
//! Exact duplicate boundaries are removed, which can leave fewer portfolios
//! than requested when the variable is concentrated (many zeros or ties).
//! The outermost boundaries are replaced by `-inf` and `+inf` so every value
//! is classified.

use crate::error::{Result, SortError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered portfolio boundaries.
///
/// Invariant: at least two boundaries, non-decreasing, no NaN. Boundaries
/// produced by [`compute_breakpoints`] start at `-inf` and end at `+inf`.
///
/// Serialized as `{"boundaries": [...]}` with open ends written as `null`;
/// deserialization goes through [`Breakpoints::from_boundaries`].
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoints {
    boundaries: Vec<f64>,
}

/// Wire form of [`Breakpoints`]. JSON has no infinities.
#[derive(Serialize, Deserialize)]
struct BoundaryList {
    boundaries: Vec<Option<f64>>,
}

impl Serialize for Breakpoints {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let last = self.boundaries.len() - 1;
        let boundaries = self
            .boundaries
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                let open = (i == 0 && b == f64::NEG_INFINITY) || (i == last && b == f64::INFINITY);
                (!open).then_some(b)
            })
            .collect();
        BoundaryList { boundaries }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Breakpoints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BoundaryList::deserialize(deserializer)?;
        let last = raw.boundaries.len().saturating_sub(1);
        let boundaries = raw
            .boundaries
            .into_iter()
            .enumerate()
            .map(|(i, b)| match b {
                Some(v) => Ok(v),
                None if i == 0 => Ok(f64::NEG_INFINITY),
                None if i == last => Ok(f64::INFINITY),
                None => Err(serde::de::Error::custom(format!(
                    "interior boundary {} is null",
                    i
                ))),
            })
            .collect::<std::result::Result<Vec<f64>, D::Error>>()?;
        Self::from_boundaries(boundaries).map_err(serde::de::Error::custom)
    }
}

impl Breakpoints {
    /// Build breakpoints from explicit boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::InvalidConfiguration`] for fewer than two
    /// boundaries, NaN boundaries or a decreasing sequence.
    pub fn from_boundaries(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(SortError::InvalidConfiguration(format!(
                "breakpoints need at least two boundaries, got {}",
                boundaries.len()
            )));
        }
        if boundaries.iter().any(|b| b.is_nan()) {
            return Err(SortError::InvalidConfiguration(
                "breakpoints contain NaN".into(),
            ));
        }
        if boundaries.windows(2).any(|w| w[0] > w[1]) {
            return Err(SortError::InvalidConfiguration(
                "breakpoints must be non-decreasing".into(),
            ));
        }
        Ok(Self { boundaries })
    }

    /// Turn raw quantiles into open-ended breakpoints.
    fn from_quantiles(mut quantiles: Vec<f64>) -> Self {
        let requested = quantiles.len().saturating_sub(1);
        quantiles.dedup();

        if quantiles.len() < 2 {
            tracing::debug!(requested, "reference values are constant, single portfolio");
            return Self {
                boundaries: vec![f64::NEG_INFINITY, f64::INFINITY],
            };
        }

        let last = quantiles.len() - 1;
        quantiles[0] = f64::NEG_INFINITY;
        quantiles[last] = f64::INFINITY;

        if last < requested {
            tracing::debug!(
                requested,
                effective = last,
                "duplicate breakpoints removed"
            );
        }

        Self {
            boundaries: quantiles,
        }
    }

    /// All boundaries, including the outer ones.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Boundaries strictly between the first and the last.
    pub fn interior(&self) -> &[f64] {
        &self.boundaries[1..self.boundaries.len() - 1]
    }

    /// Number of portfolios the breakpoints define.
    pub fn n_portfolios(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Portfolio label of a single value.
    ///
    /// Intervals are left-closed and right-open; values at or below the first
    /// boundary fall into portfolio 1 and values at or above the last into
    /// the top portfolio.
    pub fn label(&self, value: f64) -> u32 {
        let below = self.interior().partition_point(|b| *b <= value);
        (below + 1) as u32
    }
}

/// How breakpoints are derived from reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointRule {
    /// `n` portfolios at evenly spaced probabilities `0, 1/n, ..., 1`.
    Quantiles(u32),

    /// Explicit probability grid, e.g. `[0.0, 0.3, 0.7, 1.0]`.
    Percentiles(Vec<f64>),
}

impl BreakpointRule {
    /// Number of portfolios requested (before duplicate removal).
    pub fn n_portfolios(&self) -> usize {
        match self {
            Self::Quantiles(n) => *n as usize,
            Self::Percentiles(p) => p.len().saturating_sub(1),
        }
    }

    /// Validate the rule without computing anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Quantiles(n) => validate_portfolio_count(*n),
            Self::Percentiles(p) => validate_percentiles(p),
        }
    }

    /// Compute breakpoints from reference values.
    pub fn compute(&self, reference_values: &[f64]) -> Result<Breakpoints> {
        match self {
            Self::Quantiles(n) => compute_breakpoints(reference_values, *n),
            Self::Percentiles(p) => compute_percentile_breakpoints(reference_values, p),
        }
    }
}

impl Default for BreakpointRule {
    fn default() -> Self {
        Self::Quantiles(5)
    }
}

fn validate_portfolio_count(n_portfolios: u32) -> Result<()> {
    if n_portfolios < 1 {
        return Err(SortError::InvalidConfiguration(
            "number of portfolios must be at least 1".into(),
        ));
    }
    Ok(())
}

fn validate_percentiles(percentiles: &[f64]) -> Result<()> {
    if percentiles.len() < 2 {
        return Err(SortError::InvalidConfiguration(
            "percentile grid needs at least two points".into(),
        ));
    }
    if percentiles.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(SortError::InvalidConfiguration(
            "percentiles must lie within [0, 1]".into(),
        ));
    }
    if percentiles.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SortError::InvalidConfiguration(
            "percentiles must be strictly increasing".into(),
        ));
    }
    Ok(())
}

/// Sort reference values, rejecting empty input and NaN.
fn sorted_reference(reference_values: &[f64]) -> Result<Vec<f64>> {
    if reference_values.is_empty() {
        return Err(SortError::insufficient("reference universe is empty"));
    }
    if let Some(index) = reference_values.iter().position(|v| v.is_nan()) {
        return Err(SortError::missing_at(index, "reference value"));
    }

    let mut sorted = reference_values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Quantile of sorted data with linear interpolation between order statistics.
fn quantile_sorted(sorted: &[f64], probability: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * probability;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = h - lo as f64;

    if frac == 0.0 {
        sorted[lo]
    } else {
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}

/// Compute breakpoints for `n_portfolios` evenly spaced quantiles.
///
/// # Errors
///
/// * [`SortError::InvalidConfiguration`] if `n_portfolios < 1`
/// * [`SortError::InsufficientData`] if `reference_values` is empty
/// * [`SortError::MissingValue`] if a reference value is NaN
pub fn compute_breakpoints(reference_values: &[f64], n_portfolios: u32) -> Result<Breakpoints> {
    validate_portfolio_count(n_portfolios)?;
    let sorted = sorted_reference(reference_values)?;

    let n = n_portfolios as usize;
    let quantiles = (0..=n)
        .map(|k| quantile_sorted(&sorted, k as f64 / n as f64))
        .collect();

    Ok(Breakpoints::from_quantiles(quantiles))
}

/// Compute breakpoints at an explicit probability grid.
///
/// The first and last grid points only fix the number of portfolios; their
/// quantiles are replaced by `-inf` and `+inf`.
pub fn compute_percentile_breakpoints(
    reference_values: &[f64],
    percentiles: &[f64],
) -> Result<Breakpoints> {
    validate_percentiles(percentiles)?;
    let sorted = sorted_reference(reference_values)?;

    let quantiles = percentiles
        .iter()
        .map(|p| quantile_sorted(&sorted, *p))
        .collect();

    Ok(Breakpoints::from_quantiles(quantiles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use rstest::rstest;

    #[test]
    fn test_median_of_two_values() {
        let bp = compute_breakpoints(&[10.0, 20.0], 2).unwrap();
        assert_eq!(bp.boundaries(), &[f64::NEG_INFINITY, 15.0, f64::INFINITY]);
        assert_eq!(bp.n_portfolios(), 2);
    }

    #[test]
    fn test_linear_interpolation_matches_numpy() {
        // numpy.quantile([1, 2, 3, 4], [0, .25, .5, .75, 1]) == [1, 1.75, 2.5, 3.25, 4]
        let bp = compute_breakpoints(&[4.0, 1.0, 3.0, 2.0], 4).unwrap();
        let b = bp.boundaries();
        assert_eq!(b.len(), 5);
        assert_relative_eq!(b[1], 1.75);
        assert_relative_eq!(b[2], 2.5);
        assert_relative_eq!(b[3], 3.25);
    }

    #[test]
    fn test_percentile_grid() {
        let values: Vec<f64> = (0..=10).map(f64::from).collect();
        let bp = compute_percentile_breakpoints(&values, &[0.0, 0.3, 0.7, 1.0]).unwrap();
        let b = bp.boundaries();
        assert_eq!(b.len(), 4);
        assert_relative_eq!(b[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(b[2], 7.0, epsilon = 1e-12);
        assert!(b[0].is_infinite() && b[0] < 0.0);
        assert!(b[3].is_infinite() && b[3] > 0.0);
    }

    #[test]
    fn test_duplicates_reduce_portfolio_count() {
        let values = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0];
        let bp = compute_breakpoints(&values, 4).unwrap();
        assert!(bp.n_portfolios() < 4);
        assert_eq!(bp.boundaries()[0], f64::NEG_INFINITY);
        assert_eq!(*bp.boundaries().last().unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_constant_reference_gives_single_portfolio() {
        let bp = compute_breakpoints(&[3.0, 3.0, 3.0], 5).unwrap();
        assert_eq!(bp.boundaries(), &[f64::NEG_INFINITY, f64::INFINITY]);
        assert_eq!(bp.label(-100.0), 1);
        assert_eq!(bp.label(100.0), 1);
    }

    #[test]
    fn test_single_portfolio_request() {
        let bp = compute_breakpoints(&[1.0, 5.0], 1).unwrap();
        assert_eq!(bp.n_portfolios(), 1);
    }

    #[test]
    fn test_empty_reference_is_insufficient_data() {
        let err = compute_breakpoints(&[], 5).unwrap_err();
        assert!(matches!(err, SortError::InsufficientData { .. }));
    }

    #[test]
    fn test_nan_reference_is_missing_value() {
        let err = compute_breakpoints(&[1.0, f64::NAN], 2).unwrap_err();
        assert_eq!(err, SortError::missing_at(1, "reference value"));
    }

    #[test]
    fn test_zero_portfolios_is_invalid() {
        let err = compute_breakpoints(&[1.0], 0).unwrap_err();
        assert!(matches!(err, SortError::InvalidConfiguration(_)));
    }

    #[rstest]
    #[case(vec![0.5])]
    #[case(vec![0.0, 0.7, 0.3, 1.0])]
    #[case(vec![0.0, 0.5, 0.5, 1.0])]
    #[case(vec![-0.1, 1.0])]
    #[case(vec![0.0, 1.2])]
    fn test_invalid_percentiles(#[case] grid: Vec<f64>) {
        let err = compute_percentile_breakpoints(&[1.0, 2.0], &grid).unwrap_err();
        assert!(matches!(err, SortError::InvalidConfiguration(_)));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    #[case(10)]
    fn test_breakpoint_invariants_random(#[case] n: u32) {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let len = rng.gen_range(1..40);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-5.0..5.0)).collect();
            let bp = compute_breakpoints(&values, n).unwrap();
            let b = bp.boundaries();

            assert!(b.len() <= n as usize + 1);
            assert!(b.len() >= 2);
            assert_eq!(b[0], f64::NEG_INFINITY);
            assert_eq!(b[b.len() - 1], f64::INFINITY);
            assert!(b.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_from_boundaries_validation() {
        assert!(Breakpoints::from_boundaries(vec![1.0]).is_err());
        assert!(Breakpoints::from_boundaries(vec![2.0, 1.0]).is_err());
        assert!(Breakpoints::from_boundaries(vec![0.0, f64::NAN]).is_err());
        assert!(Breakpoints::from_boundaries(vec![f64::NEG_INFINITY, 0.0, f64::INFINITY]).is_ok());
    }

    #[test]
    fn test_serde_round_trip_keeps_open_ends() {
        let bp = compute_breakpoints(&[10.0, 20.0], 2).unwrap();
        let json = serde_json::to_string(&bp).unwrap();
        assert_eq!(json, r#"{"boundaries":[null,15.0,null]}"#);

        let back: Breakpoints = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bp);
        assert_eq!(back.label(15.0), 2);
    }

    #[rstest]
    #[case(r#"{"boundaries":[]}"#)]
    #[case(r#"{"boundaries":[null]}"#)]
    #[case(r#"{"boundaries":[5.0,1.0]}"#)]
    #[case(r#"{"boundaries":[null,3.0,1.0,null]}"#)]
    #[case(r#"{"boundaries":[null,null,null]}"#)]
    fn test_deserialize_rejects_invalid_boundaries(#[case] json: &str) {
        assert!(serde_json::from_str::<Breakpoints>(json).is_err());
    }

    #[test]
    fn test_rule_portfolio_counts() {
        assert_eq!(BreakpointRule::Quantiles(2).n_portfolios(), 2);
        assert_eq!(
            BreakpointRule::Percentiles(vec![0.0, 0.3, 0.7, 1.0]).n_portfolios(),
            3
        );
        assert_eq!(BreakpointRule::default().n_portfolios(), 5);
        assert!(BreakpointRule::Quantiles(0).validate().is_err());
    }
}
