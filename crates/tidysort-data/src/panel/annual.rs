//! Annual sorting panel for Fama-French factor replication.
//!
//! Characteristics are measured once a year and portfolios are formed on
//! July 1. Monthly returns from July to the following June are attributed
//! to that formation.

use crate::calendar::{FORMATION_MONTH, add_months, formation_date, formation_day};
use crate::error::Result;
use crate::ingest::{Compustat, CrspMonthly};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tidysort_sorts::{Assignment, Exchange, Observation, SortingVariable};

/// Inputs of the annual panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnualPanelConfig {
    /// Month whose market cap is the size characteristic.
    pub size_month: u32,
    /// Month whose market cap is the book-to-market denominator.
    pub market_equity_month: u32,
    /// Variables every panel row must carry.
    pub variables: Vec<SortingVariable>,
}

impl AnnualPanelConfig {
    /// Three-factor panel: size and book-to-market.
    pub fn three_factor() -> Self {
        Self::default()
    }

    /// Five-factor panel: adds operating profitability and investment.
    pub fn five_factor() -> Self {
        Self {
            variables: vec![
                SortingVariable::Size,
                SortingVariable::BookToMarket,
                SortingVariable::OperatingProfitability,
                SortingVariable::Investment,
            ],
            ..Self::default()
        }
    }
}

impl Default for AnnualPanelConfig {
    fn default() -> Self {
        Self {
            size_month: 6,
            market_equity_month: 12,
            variables: vec![SortingVariable::Size, SortingVariable::BookToMarket],
        }
    }
}

/// Months from `month` to the next July 1 formation date.
fn months_to_formation(month: u32) -> i32 {
    let ahead = (FORMATION_MONTH as i32 - month as i32).rem_euclid(12);
    if ahead == 0 { 12 } else { ahead }
}

/// Build the annual panel of sorting characteristics, one row per
/// `(permno, formation date)`.
///
/// - `size` is the market cap in `size_month` (June), formed the next July;
/// - `me` is the market cap in `market_equity_month` (December), used the
///   July after;
/// - `bm = be / me` for the fiscal year ending in the calendar year before
///   the formation date, with `op` and `inv` carried along.
///
/// Compustat rows lacking any of `be`, `op` or `inv` are dropped whatever
/// the model, so three- and five-factor sorts share one firm sample. The
/// exchange is the one of the size month. Rows lacking any of
/// `config.variables` are dropped; a duplicate `(permno, formation date)`
/// keeps the fiscal period ending first.
pub fn build_annual_panel(
    crsp: &[CrspMonthly],
    compustat: &[Compustat],
    config: &AnnualPanelConfig,
) -> Result<Vec<Observation>> {
    let complete: Vec<&CrspMonthly> = crsp.iter().filter(|r| r.is_complete()).collect();

    // size and listing at formation
    let mut size_at: HashMap<(u64, NaiveDate), (f64, Exchange)> = HashMap::new();
    for row in complete.iter().filter(|r| r.date.month() == config.size_month) {
        if let Some(mktcap) = row.mktcap {
            let sorting_date = add_months(row.date, months_to_formation(config.size_month))?;
            size_at.insert((row.permno, sorting_date), (mktcap, row.exchange));
        }
    }

    // market equity by company and formation date
    let me_lag = months_to_formation(config.market_equity_month)
        + if config.market_equity_month >= FORMATION_MONTH { 0 } else { 12 };
    let mut me_at: HashMap<(&str, NaiveDate), Vec<(u64, f64)>> = HashMap::new();
    for row in complete
        .iter()
        .filter(|r| r.date.month() == config.market_equity_month)
    {
        if let (Some(gvkey), Some(mktcap)) = (row.gvkey.as_deref(), row.mktcap) {
            let sorting_date = add_months(row.date, me_lag)?;
            me_at
                .entry((gvkey, sorting_date))
                .or_default()
                .push((row.permno, mktcap));
        }
    }

    // one accounting sample for every model
    let mut books: Vec<&Compustat> = compustat.iter().filter(|c| c.is_complete()).collect();
    tracing::debug!(
        rows = compustat.len(),
        complete = books.len(),
        "filtered incomplete compustat rows"
    );
    books.sort_by(|a, b| (&a.gvkey, a.datadate).cmp(&(&b.gvkey, b.datadate)));

    let mut seen: HashSet<(u64, NaiveDate)> = HashSet::new();
    let mut panel = Vec::new();
    for book in books {
        let sorting_date = formation_day(book.datadate.year() + 1)?;
        let Some(matches) = me_at.get(&(book.gvkey.as_str(), sorting_date)) else {
            continue;
        };

        for (permno, me) in matches {
            let Some((size, exchange)) = size_at.get(&(*permno, sorting_date)) else {
                continue;
            };

            let mut obs = Observation::new(*permno, sorting_date, *exchange)
                .with(SortingVariable::Size, *size)
                .with(SortingVariable::MarketEquity, *me);
            if let Some(be) = book.be {
                obs = obs.with(SortingVariable::BookToMarket, be / me);
            }
            if let Some(op) = book.op {
                obs = obs.with(SortingVariable::OperatingProfitability, op);
            }
            if let Some(inv) = book.inv {
                obs = obs.with(SortingVariable::Investment, inv);
            }

            let complete_row = config
                .variables
                .iter()
                .all(|v| v.value(&obs).is_some_and(f64::is_finite));
            if complete_row && seen.insert(obs.key()) {
                panel.push(obs);
            }
        }
    }

    panel.sort_by_key(|o| (o.period, o.permno));
    tracing::info!(
        observations = panel.len(),
        formations = panel
            .iter()
            .map(|o| o.period)
            .collect::<HashSet<_>>()
            .len(),
        "built annual sorting panel"
    );
    Ok(panel)
}

/// Monthly return observations of complete CRSP rows.
pub fn monthly_returns(crsp: &[CrspMonthly]) -> Vec<Observation> {
    crsp.iter()
        .filter(|r| r.is_complete())
        .filter_map(|r| {
            let (ret, lag) = (r.ret_excess?, r.mktcap_lag?);
            Some(Observation::new(r.permno, r.date, r.exchange).with_return(ret, lag))
        })
        .collect()
}

/// Re-key formation assignments to every monthly return they cover.
///
/// A return dated `t` takes the labels formed at [`formation_date`]`(t)`;
/// returns without a matching formation are dropped.
pub fn assignments_for_returns(
    returns: &[Observation],
    formations: &[Assignment],
) -> Result<Vec<Assignment>> {
    let by_key: HashMap<(u64, NaiveDate), &Assignment> =
        formations.iter().map(|a| (a.key(), a)).collect();

    let mut out = Vec::with_capacity(returns.len());
    for ret in returns {
        let formed = formation_date(ret.period)?;
        if let Some(assignment) = by_key.get(&(ret.permno, formed)) {
            out.push(Assignment {
                permno: ret.permno,
                period: ret.period,
                labels: assignment.labels.clone(),
            });
        }
    }

    tracing::debug!(
        returns = returns.len(),
        matched = out.len(),
        "attributed monthly returns to formations"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn crsp(permno: u64, gvkey: &str, date: NaiveDate, mktcap: f64) -> CrspMonthly {
        CrspMonthly {
            permno,
            gvkey: Some(gvkey.into()),
            date,
            ret_excess: Some(0.01),
            mktcap: Some(mktcap),
            mktcap_lag: Some(mktcap),
            exchange: Exchange::Nyse,
        }
    }

    fn book(gvkey: &str, y: i32, be: f64, op: Option<f64>) -> Compustat {
        Compustat {
            gvkey: gvkey.into(),
            datadate: NaiveDate::from_ymd_opt(y, 12, 31).unwrap(),
            be: Some(be),
            op,
            inv: Some(0.1),
        }
    }

    #[test]
    fn test_months_to_formation() {
        assert_eq!(months_to_formation(6), 1);
        assert_eq!(months_to_formation(12), 7);
        assert_eq!(months_to_formation(7), 12);
    }

    #[test]
    fn test_annual_panel_alignment() {
        let crsp_rows = vec![
            crsp(1, "001000", d(2019, 12), 200.0),
            crsp(1, "001000", d(2020, 6), 250.0),
            crsp(2, "002000", d(2019, 12), 50.0),
        ];
        let compustat = vec![
            book("001000", 2019, 100.0, Some(0.2)),
            book("002000", 2019, 10.0, Some(0.1)),
        ];

        let panel =
            build_annual_panel(&crsp_rows, &compustat, &AnnualPanelConfig::three_factor()).unwrap();

        // permno 2 has no June size
        assert_eq!(panel.len(), 1);
        let obs = &panel[0];
        assert_eq!(obs.period, d(2020, 7));
        assert_relative_eq!(obs.size.unwrap(), 250.0);
        assert_relative_eq!(obs.me.unwrap(), 200.0);
        assert_relative_eq!(obs.bm.unwrap(), 0.5);
        assert_relative_eq!(obs.op.unwrap(), 0.2);
    }

    #[test]
    fn test_incomplete_accounting_dropped_for_every_model() {
        let crsp_rows = vec![
            crsp(1, "001000", d(2019, 12), 200.0),
            crsp(1, "001000", d(2020, 6), 250.0),
            crsp(2, "002000", d(2019, 12), 100.0),
            crsp(2, "002000", d(2020, 6), 120.0),
        ];
        let mut no_investment = book("002000", 2019, 50.0, Some(0.3));
        no_investment.inv = None;
        let compustat = vec![book("001000", 2019, 100.0, None), no_investment];

        for config in [AnnualPanelConfig::three_factor(), AnnualPanelConfig::five_factor()] {
            let panel = build_annual_panel(&crsp_rows, &compustat, &config).unwrap();
            assert!(panel.is_empty());
        }
    }

    #[test]
    fn test_returns_follow_formation() {
        let mut formed = Assignment::new(1, d(2020, 7));
        formed.labels.insert(SortingVariable::Size, 2);

        let returns: Vec<Observation> = [d(2020, 6), d(2020, 7), d(2021, 6), d(2021, 7)]
            .into_iter()
            .map(|date| Observation::new(1, date, Exchange::Nyse).with_return(0.01, 1.0))
            .collect();

        let assigned = assignments_for_returns(&returns, &[formed]).unwrap();
        let periods: Vec<NaiveDate> = assigned.iter().map(|a| a.period).collect();
        assert_eq!(periods, vec![d(2020, 7), d(2021, 6)]);
        assert!(assigned.iter().all(|a| a.label(SortingVariable::Size) == Some(2)));
    }

    #[test]
    fn test_monthly_returns_drop_incomplete() {
        let mut incomplete = crsp(2, "002000", d(2020, 1), 10.0);
        incomplete.mktcap_lag = None;
        let returns = monthly_returns(&[crsp(1, "001000", d(2020, 1), 10.0), incomplete]);
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].permno, 1);
    }
}
