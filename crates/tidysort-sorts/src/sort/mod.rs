//! Independent and dependent portfolio sorts.
//!
//! An *independent* sort computes each variable's breakpoints over the whole
//! cross-section. A *dependent* sort first sorts on a primary variable and
//! then recomputes the secondary breakpoints inside every primary group,
//! which balances the number of firms per combined portfolio. Swapping the
//! primary and secondary variables of a dependent sort changes the result.

pub mod dependent;
pub mod independent;

pub use dependent::{dependent_sort, dependent_sort_many};
pub use independent::{cross_section_breakpoints, independent_sort};

use crate::breakpoints::BreakpointRule;
use crate::error::{Result, SortError};
use crate::observation::{Observation, SortingVariable};
use crate::period::{PeriodPolicy, for_each_period};
use crate::universe::ReferenceUniverse;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One sorting variable with its breakpoint rule and reference universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Variable to sort on.
    pub variable: SortingVariable,
    /// How breakpoints are derived.
    pub rule: BreakpointRule,
    /// Observations breakpoints are computed from.
    #[serde(default)]
    pub reference: ReferenceUniverse,
}

impl SortSpec {
    /// Create a spec with the NYSE reference universe.
    pub fn new(variable: SortingVariable, rule: BreakpointRule) -> Self {
        Self {
            variable,
            rule,
            reference: ReferenceUniverse::default(),
        }
    }

    /// `n_portfolios` evenly spaced quantile portfolios on NYSE breakpoints.
    pub fn quantiles(variable: SortingVariable, n_portfolios: u32) -> Self {
        Self::new(variable, BreakpointRule::Quantiles(n_portfolios))
    }

    /// Replace the reference universe.
    pub fn with_reference(mut self, reference: ReferenceUniverse) -> Self {
        self.reference = reference;
        self
    }

    /// Validate the rule and the reference universe.
    pub fn validate(&self) -> Result<()> {
        self.rule.validate()?;
        self.reference.validate()
    }
}

/// Validate a set of specs and reject a variable listed twice.
pub(crate) fn validate_specs<'a, I>(specs: I) -> Result<()>
where
    I: IntoIterator<Item = &'a SortSpec>,
{
    let mut seen = BTreeSet::new();
    let mut any = false;
    for spec in specs {
        any = true;
        spec.validate()?;
        if !seen.insert(spec.variable) {
            return Err(SortError::InvalidConfiguration(format!(
                "variable {} is sorted twice",
                spec.variable
            )));
        }
    }
    if !any {
        return Err(SortError::InvalidConfiguration(
            "at least one sort spec is required".into(),
        ));
    }
    Ok(())
}

/// Portfolio labels of one observation, keyed by sorting variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortfolioLabels(BTreeMap<SortingVariable, u32>);

impl PortfolioLabels {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for a variable, if the observation was sorted on it.
    pub fn get(&self, variable: SortingVariable) -> Option<u32> {
        self.0.get(&variable).copied()
    }

    /// Set the label for a variable.
    pub fn insert(&mut self, variable: SortingVariable, label: u32) {
        self.0.insert(variable, label);
    }

    /// Keep only the listed variables.
    ///
    /// Returns `None` if one of them is not labelled.
    pub fn restrict(&self, variables: &[SortingVariable]) -> Option<Self> {
        variables
            .iter()
            .map(|v| self.get(*v).map(|label| (*v, label)))
            .collect::<Option<BTreeMap<_, _>>>()
            .map(Self)
    }

    /// Iterate over `(variable, label)` pairs in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (SortingVariable, u32)> + '_ {
        self.0.iter().map(|(v, l)| (*v, *l))
    }

    /// Number of labelled variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no variable is labelled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(SortingVariable, u32)> for PortfolioLabels {
    fn from_iter<T: IntoIterator<Item = (SortingVariable, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PortfolioLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(v, l)| format!("{}={}", v, l)).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Portfolio membership of one security at one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Security identifier.
    pub permno: u64,
    /// Period the assignment was formed at.
    pub period: NaiveDate,
    /// Labels per sorting variable.
    pub labels: PortfolioLabels,
}

impl Assignment {
    /// Create an assignment with no labels.
    pub fn new(permno: u64, period: NaiveDate) -> Self {
        Self {
            permno,
            period,
            labels: PortfolioLabels::new(),
        }
    }

    /// Label for one variable.
    pub fn label(&self, variable: SortingVariable) -> Option<u32> {
        self.labels.get(variable)
    }

    /// Join key matching [`Observation::key`].
    pub const fn key(&self) -> (u64, NaiveDate) {
        (self.permno, self.period)
    }
}

/// How a panel of cross-sections is sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    /// Every spec sorted over the whole cross-section.
    Independent(Vec<SortSpec>),

    /// Secondary specs sorted within each group of the primary spec.
    Dependent {
        /// First-stage sort.
        primary: SortSpec,
        /// Second-stage sorts, each recomputed per primary group.
        secondaries: Vec<SortSpec>,
    },
}

impl SortMethod {
    /// Variables labelled by this method, primary first.
    pub fn variables(&self) -> Vec<SortingVariable> {
        match self {
            Self::Independent(specs) => specs.iter().map(|s| s.variable).collect(),
            Self::Dependent {
                primary,
                secondaries,
            } => std::iter::once(primary.variable)
                .chain(secondaries.iter().map(|s| s.variable))
                .collect(),
        }
    }

    /// Sort one period's cross-section.
    pub fn sort_cross_section(&self, observations: &[&Observation]) -> Result<Vec<Assignment>> {
        match self {
            Self::Independent(specs) => independent::sort_refs(observations, specs),
            Self::Dependent {
                primary,
                secondaries,
            } => dependent::sort_refs(observations, primary, secondaries),
        }
    }
}

/// Sort every period of a panel.
///
/// Periods are processed in ascending order; a period failing with
/// insufficient data is handled according to `policy`.
pub fn sort_panel(
    observations: &[Observation],
    method: &SortMethod,
    policy: PeriodPolicy,
) -> Result<Vec<Assignment>> {
    match method {
        SortMethod::Independent(specs) => validate_specs(specs)?,
        SortMethod::Dependent {
            primary,
            secondaries,
        } => validate_specs(std::iter::once(primary).chain(secondaries))?,
    }

    for_each_period(observations, policy, |_, cross_section| {
        method.sort_cross_section(cross_section)
    })
}
