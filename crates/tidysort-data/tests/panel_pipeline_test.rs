//! Integration tests from the SQLite store to factor returns

use approx::assert_relative_eq;
use chrono::NaiveDate;
use tidysort_data::{
    AnnualPanelConfig, Compustat, CrspMonthly, TidyFinanceDb, assignments_for_returns,
    build_annual_panel, monthly_returns,
};
use tidysort_sorts::{
    Exchange, Leg, PeriodPolicy, SortMethod, SortSpec, SortingVariable, Weighting, long_short,
    portfolio_returns, sort_panel,
};

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn firm_rows(permno: u64, ret: f64) -> Vec<CrspMonthly> {
    let mktcap = 10.0 * permno as f64;
    [d(2019, 12), d(2020, 6), d(2020, 7), d(2020, 8)]
        .into_iter()
        .map(|date| CrspMonthly {
            permno,
            gvkey: Some(format!("{:06}", permno)),
            date,
            ret_excess: Some(ret),
            mktcap: Some(mktcap),
            mktcap_lag: Some(mktcap),
            exchange: Exchange::Nyse,
        })
        .collect()
}

fn seeded_db() -> TidyFinanceDb {
    let db = TidyFinanceDb::in_memory().unwrap();
    let crsp: Vec<CrspMonthly> = (1..=4)
        .flat_map(|permno| firm_rows(permno, if permno <= 2 { 0.02 } else { 0.01 }))
        .collect();
    let compustat: Vec<Compustat> = (1..=4)
        .map(|permno| Compustat {
            gvkey: format!("{:06}", permno),
            datadate: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
            be: Some(5.0 * permno as f64),
            op: Some(0.1),
            inv: Some(0.05),
        })
        .collect();
    db.put_crsp_monthly(&crsp).unwrap();
    db.put_compustat(&compustat).unwrap();
    db
}

#[test]
fn test_size_factor_from_store() {
    let db = seeded_db();
    let crsp = db.load_crsp_monthly().unwrap();
    let compustat = db.load_compustat().unwrap();
    assert_eq!(crsp.len(), 16);

    let panel = build_annual_panel(&crsp, &compustat, &AnnualPanelConfig::three_factor()).unwrap();
    assert_eq!(panel.len(), 4);
    assert!(panel.iter().all(|o| o.period == d(2020, 7)));

    let method = SortMethod::Independent(vec![SortSpec::quantiles(SortingVariable::Size, 2)]);
    let formations = sort_panel(&panel, &method, PeriodPolicy::Skip).unwrap();

    let returns = monthly_returns(&crsp);
    let assigned = assignments_for_returns(&returns, &formations).unwrap();
    // only July and August 2020 fall after the formation
    assert_eq!(assigned.len(), 8);

    let portfolios = portfolio_returns(
        &returns,
        &assigned,
        &[SortingVariable::Size],
        Weighting::Value,
        PeriodPolicy::Skip,
    )
    .unwrap();
    assert_eq!(portfolios.len(), 4);

    let smb = long_short(
        &portfolios,
        SortingVariable::Size,
        Leg::Bottom,
        Leg::Top,
        PeriodPolicy::Skip,
    )
    .unwrap();
    assert_eq!(smb.len(), 2);
    for point in &smb {
        assert_relative_eq!(point.value, 0.01, epsilon = 1e-12);
    }
}

#[test]
fn test_book_to_market_uses_december_equity() {
    let db = seeded_db();
    let panel = build_annual_panel(
        &db.load_crsp_monthly().unwrap(),
        &db.load_compustat().unwrap(),
        &AnnualPanelConfig::five_factor(),
    )
    .unwrap();

    for obs in &panel {
        // be = 5 * permno over me = 10 * permno
        assert_relative_eq!(obs.bm.unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(obs.inv.unwrap(), 0.05);
    }
}
