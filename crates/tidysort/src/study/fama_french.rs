//! Fama-French factor replication.
//!
//! Portfolios are formed each July from June size and the previous fiscal
//! year's accounting data, held for twelve months and value weighted.
//!
//! - three factors: independent 2x3 sorts on size and book-to-market
//! - five factors: book-to-market, profitability and investment terciles
//!   within size halves, with SMB pooled over the three size tables

use crate::error::{Result, StudyError};
use serde::{Deserialize, Serialize};
use tidysort_data::{
    AnnualPanelConfig, Compustat, CrspMonthly, PublishedFactors, assignments_for_returns,
    build_annual_panel, monthly_returns,
};
use tidysort_output::{FactorComparison, ReplicationSummary};
use tidysort_sorts::{
    Assignment, BreakpointRule, FactorCategory, FactorInfo, FactorReturn, FactorSeries,
    Observation, PeriodPolicy, PortfolioReturn, ReferenceUniverse, SortMethod, SortSpec,
    SortingVariable, Weighting, available_factors, dependent_sort_many, get_factor_info,
    long_short, portfolio_returns, sort_panel,
};

/// Settings of the Fama-French replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamaFrenchConfig {
    /// Breakpoint percentiles of size
    pub size_percentiles: Vec<f64>,
    /// Breakpoint percentiles of book-to-market, profitability and investment
    pub characteristic_percentiles: Vec<f64>,
    /// Universe the breakpoints are computed on
    pub reference: ReferenceUniverse,
    /// Return weighting within portfolios
    pub weighting: Weighting,
    /// Handling of periods with too little data
    pub policy: PeriodPolicy,
    /// Decimals both series are rounded to before comparison
    pub comparison_decimals: i32,
}

impl Default for FamaFrenchConfig {
    fn default() -> Self {
        Self {
            size_percentiles: vec![0.0, 0.5, 1.0],
            characteristic_percentiles: vec![0.0, 0.3, 0.7, 1.0],
            reference: ReferenceUniverse::nyse(),
            weighting: Weighting::Value,
            policy: PeriodPolicy::Skip,
            comparison_decimals: 4,
        }
    }
}

impl FamaFrenchConfig {
    fn spec(&self, variable: SortingVariable) -> SortSpec {
        let percentiles = if variable == SortingVariable::Size {
            &self.size_percentiles
        } else {
            &self.characteristic_percentiles
        };
        SortSpec::new(variable, BreakpointRule::Percentiles(percentiles.clone()))
            .with_reference(self.reference.clone())
    }
}

/// Replicated factors and the formations they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Replication {
    /// Factor series, SMB first
    pub factors: Vec<FactorSeries>,
    /// Portfolio labels of every firm at every July formation
    pub assignments: Vec<Assignment>,
}

impl Replication {
    /// Series of one factor by name.
    pub fn factor(&self, name: &str) -> Option<&FactorSeries> {
        self.factors.iter().find(|f| f.name == name)
    }
}

fn factor(name: &str) -> Result<FactorInfo> {
    get_factor_info(name)
        .ok_or_else(|| StudyError::InvalidConfiguration(format!("unknown factor: {}", name)))
}

fn factor_series(
    info: &FactorInfo,
    returns: &[PortfolioReturn],
    policy: PeriodPolicy,
) -> Result<FactorSeries> {
    let points = long_short(returns, info.variable, info.long, info.short, policy)?;
    tracing::info!(factor = info.name, periods = points.len(), "replicated factor");
    Ok(FactorSeries::new(info.name, points))
}

/// Monthly returns of the portfolios formed by `formations`, grouped by
/// the variables in `by`.
fn formation_returns(
    formations: &[Assignment],
    returns: &[Observation],
    by: &[SortingVariable],
    config: &FamaFrenchConfig,
) -> Result<Vec<PortfolioReturn>> {
    let assigned = assignments_for_returns(returns, formations)?;
    Ok(portfolio_returns(
        returns,
        &assigned,
        by,
        config.weighting,
        config.policy,
    )?)
}

/// Size sort, then every secondary sorted within the size groups, one
/// July formation at a time.
fn size_dependent_formations(
    panel: &[Observation],
    secondaries: &[SortSpec],
    config: &FamaFrenchConfig,
) -> Result<Vec<Assignment>> {
    let primary = config.spec(SortingVariable::Size);
    let mut formations = Vec::new();
    // the annual panel is ordered by formation date
    for cross_section in panel.chunk_by(|a, b| a.period == b.period) {
        let Some(first) = cross_section.first() else {
            continue;
        };
        let sorted = dependent_sort_many(cross_section, &primary, secondaries);
        if let Some(assignments) = config.policy.handle(first.period, sorted)? {
            formations.extend(assignments);
        }
    }
    Ok(formations)
}

/// Replicate SMB and HML.
///
/// Size (median) and book-to-market (30th and 70th percentile) are sorted
/// independently on NYSE breakpoints. SMB is the mean of the small
/// portfolios minus the mean of the big ones; HML the mean of the high
/// book-to-market portfolios minus the low ones.
pub fn replicate_ff3(
    crsp: &[CrspMonthly],
    compustat: &[Compustat],
    config: &FamaFrenchConfig,
) -> Result<Replication> {
    let panel = build_annual_panel(crsp, compustat, &AnnualPanelConfig::three_factor())?;
    let returns = monthly_returns(crsp);

    let method = SortMethod::Independent(vec![
        config.spec(SortingVariable::Size),
        config.spec(SortingVariable::BookToMarket),
    ]);
    let assignments = sort_panel(&panel, &method, config.policy)?;
    let portfolios = formation_returns(&assignments, &returns, &method.variables(), config)?;

    let factors = vec![
        factor_series(&factor("smb")?, &portfolios, config.policy)?,
        factor_series(&factor("hml")?, &portfolios, config.policy)?,
    ];
    Ok(Replication {
        factors,
        assignments,
    })
}

/// Replicate SMB, HML, RMW and CMA.
///
/// Size is sorted first; book-to-market, operating profitability and
/// investment are each sorted within the size groups. HML, RMW and CMA
/// come from their own size by characteristic table; SMB is small minus
/// big over the three tables pooled.
pub fn replicate_ff5(
    crsp: &[CrspMonthly],
    compustat: &[Compustat],
    config: &FamaFrenchConfig,
) -> Result<Replication> {
    let panel = build_annual_panel(crsp, compustat, &AnnualPanelConfig::five_factor())?;
    let returns = monthly_returns(crsp);

    let characteristics: Vec<FactorInfo> = available_factors()
        .into_iter()
        .filter(|f| f.category != FactorCategory::Size)
        .collect();
    let secondaries: Vec<SortSpec> = characteristics
        .iter()
        .map(|f| config.spec(f.variable))
        .collect();
    let assignments = size_dependent_formations(&panel, &secondaries, config)?;

    let mut pooled = Vec::new();
    let mut characteristic_factors = Vec::new();
    for info in &characteristics {
        let by = [SortingVariable::Size, info.variable];
        let portfolios = formation_returns(&assignments, &returns, &by, config)?;
        characteristic_factors.push(factor_series(info, &portfolios, config.policy)?);
        pooled.extend(portfolios);
    }

    let mut factors = vec![factor_series(&factor("smb")?, &pooled, config.policy)?];
    factors.extend(characteristic_factors);
    Ok(Replication {
        factors,
        assignments,
    })
}

/// Published series of one factor, skipping months where it is missing.
pub fn published_series(published: &[PublishedFactors], name: &str) -> FactorSeries {
    let points = published
        .iter()
        .filter_map(|row| {
            row.get(name).map(|value| FactorReturn {
                period: row.date,
                value,
            })
        })
        .collect();
    FactorSeries::new(name, points)
}

/// Compare replicated factors with the published ones on common months.
pub fn compare_with_published(
    study: &str,
    replicated: &[FactorSeries],
    published: &[PublishedFactors],
    decimals: i32,
) -> ReplicationSummary {
    let comparisons = replicated
        .iter()
        .map(|series| {
            let reference = published_series(published, &series.name);
            let comparison = FactorComparison::new(series, &reference, decimals);
            tracing::info!(
                factor = %series.name,
                overlap = comparison.n_overlap,
                correlation = comparison.correlation.unwrap_or(f64::NAN),
                "compared with published factor"
            );
            comparison
        })
        .collect();
    ReplicationSummary::new(study.to_string(), comparisons)
}
