//! Monthly sorting panel for bivariate size and book-to-market sorts.

use crate::calendar::{add_months, month_start};
use crate::error::Result;
use crate::ingest::{Compustat, CrspMonthly};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tidysort_sorts::{Observation, SortingVariable};

/// Lags of the monthly panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyPanelConfig {
    /// Months between a market cap and the sort it is used in.
    pub me_lag_months: u32,
    /// Months between a fiscal period end and the first sort using its book equity.
    pub book_lag_months: u32,
    /// Book-to-market older than this many months is dropped.
    pub staleness_months: u32,
}

impl Default for MonthlyPanelConfig {
    fn default() -> Self {
        Self {
            me_lag_months: 1,
            book_lag_months: 6,
            staleness_months: 12,
        }
    }
}

type FirmKey = (u64, String);

/// Build the monthly panel of returns, market equity and book-to-market.
///
/// For a row dated `t`:
/// - `me` is the market cap of `t - me_lag_months`;
/// - `bm` is book equity over the market cap in the month of the fiscal
///   period end, first usable `book_lag_months` later and carried forward
///   per `(permno, gvkey)` until it is `staleness_months` old.
///
/// Rows lacking any of return, lagged market cap, `me` or `bm` are dropped.
/// Output is ordered by period, then permno.
pub fn build_monthly_panel(
    crsp: &[CrspMonthly],
    compustat: &[Compustat],
    config: &MonthlyPanelConfig,
) -> Result<Vec<Observation>> {
    let complete: Vec<&CrspMonthly> = crsp.iter().filter(|r| r.is_complete()).collect();
    tracing::debug!(
        rows = crsp.len(),
        complete = complete.len(),
        "filtered incomplete crsp rows"
    );

    // market equity usable at sorting date
    let mut me_at: HashMap<(u64, NaiveDate), f64> = HashMap::new();
    for row in &complete {
        if let Some(mktcap) = row.mktcap {
            me_at.insert(
                (row.permno, add_months(row.date, config.me_lag_months as i32)?),
                mktcap,
            );
        }
    }

    // crsp market cap by company-month, for the book-to-market denominator
    let mut mktcap_by_company: HashMap<(&str, NaiveDate), Vec<(u64, f64)>> = HashMap::new();
    for row in &complete {
        if let (Some(gvkey), Some(mktcap)) = (row.gvkey.as_deref(), row.mktcap) {
            mktcap_by_company
                .entry((gvkey, row.date))
                .or_default()
                .push((row.permno, mktcap));
        }
    }

    // (bm, comp_date) keyed by firm and sorting date
    let mut bm_at: HashMap<(u64, &str, NaiveDate), (f64, NaiveDate)> = HashMap::new();
    for book in compustat {
        let Some(be) = book.be.filter(|v| v.is_finite()) else {
            continue;
        };
        let month = month_start(book.datadate);
        let Some(matches) = mktcap_by_company.get(&(book.gvkey.as_str(), month)) else {
            continue;
        };
        let sorting_date = add_months(month, config.book_lag_months as i32)?;
        for (permno, mktcap) in matches {
            let bm = be / mktcap;
            if bm.is_finite() {
                bm_at.insert((*permno, book.gvkey.as_str(), sorting_date), (bm, sorting_date));
            }
        }
    }

    let mut by_firm: HashMap<FirmKey, Vec<&CrspMonthly>> = HashMap::new();
    for row in &complete {
        if let Some(gvkey) = &row.gvkey {
            by_firm
                .entry((row.permno, gvkey.clone()))
                .or_default()
                .push(row);
        }
    }

    let mut panel = Vec::new();
    let mut stale = 0usize;
    for ((permno, gvkey), mut rows) in by_firm {
        rows.sort_by_key(|r| r.date);
        let mut latest: Option<(f64, NaiveDate)> = None;

        for row in rows {
            if let Some(fresh) = bm_at.get(&(permno, gvkey.as_str(), row.date)) {
                latest = Some(*fresh);
            }
            let Some((bm, comp_date)) = latest else {
                continue;
            };
            let threshold = add_months(row.date, -(config.staleness_months as i32))?;
            if comp_date <= threshold {
                stale += 1;
                continue;
            }
            let Some(me) = me_at.get(&(permno, row.date)) else {
                continue;
            };
            let (Some(ret), Some(lag)) = (row.ret_excess, row.mktcap_lag) else {
                continue;
            };

            panel.push(
                Observation::new(permno, row.date, row.exchange)
                    .with_return(ret, lag)
                    .with(SortingVariable::MarketEquity, *me)
                    .with(SortingVariable::BookToMarket, bm),
            );
        }
    }

    panel.sort_by_key(|o| (o.period, o.permno));
    tracing::info!(
        observations = panel.len(),
        stale_book_values = stale,
        "built monthly sorting panel"
    );
    Ok(panel)
}
