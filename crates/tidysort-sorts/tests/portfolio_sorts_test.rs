//! Integration tests for breakpoint sorts, returns and factors

use approx::assert_relative_eq;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tidysort_sorts::{
    Exchange, Leg, Observation, PeriodPolicy, PortfolioReturn, SortMethod, SortSpec,
    SortingVariable, Weighting, dependent_sort, independent_sort, long_short, portfolio_returns,
    sort_panel,
};

fn period() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn three_stocks() -> Vec<Observation> {
    vec![
        Observation::new(1, period(), Exchange::Nyse)
            .with(SortingVariable::Size, 10.0)
            .with_return(0.05, 100.0),
        Observation::new(2, period(), Exchange::Nyse)
            .with(SortingVariable::Size, 20.0)
            .with_return(0.10, 50.0),
        Observation::new(3, period(), Exchange::Nasdaq)
            .with(SortingVariable::Size, 15.0)
            .with_return(0.08, 200.0),
    ]
}

#[test]
fn test_end_to_end_median_split() {
    let observations = three_stocks();
    let spec = SortSpec::quantiles(SortingVariable::Size, 2);

    let assignments = independent_sort(&observations, std::slice::from_ref(&spec)).unwrap();
    let labels: Vec<u32> = assignments
        .iter()
        .map(|a| a.label(SortingVariable::Size).unwrap())
        .collect();
    // 15 sits on the median breakpoint and falls into [15, inf)
    assert_eq!(labels, vec![1, 2, 2]);

    let returns = portfolio_returns(
        &observations,
        &assignments,
        &[SortingVariable::Size],
        Weighting::Value,
        PeriodPolicy::Abort,
    )
    .unwrap();
    assert_eq!(returns.len(), 2);
    assert_relative_eq!(returns[0].ret, 0.05, epsilon = 1e-12);
    assert_relative_eq!(returns[1].ret, (0.10 * 50.0 + 0.08 * 200.0) / 250.0, epsilon = 1e-12);
}

#[test]
fn test_value_weighted_return_rounds_to_reference() {
    let observations = three_stocks();
    let nyse: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.exchange == Exchange::Nyse)
        .collect();
    let ret = tidysort_sorts::value_weighted_return(nyse, Weighting::Value).unwrap();
    assert_eq!((ret * 1e4).round() / 1e4, 0.0667);
}

#[test]
fn test_long_short_example() {
    let returns: Vec<PortfolioReturn> = [(1, 0.02), (2, 0.03), (3, 0.07)]
        .into_iter()
        .map(|(label, ret)| PortfolioReturn {
            period: period(),
            labels: [(SortingVariable::BookToMarket, label)].into_iter().collect(),
            ret,
            n_constituents: 1,
        })
        .collect();

    let factor = long_short(
        &returns,
        SortingVariable::BookToMarket,
        Leg::Label(3),
        Leg::Label(1),
        PeriodPolicy::Abort,
    )
    .unwrap();
    assert_relative_eq!(factor[0].value, 0.05, epsilon = 1e-12);
}

#[test]
fn test_independent_sort_is_idempotent() {
    let observations: Vec<Observation> = (0..40u64)
        .map(|i| {
            let exchange = if i % 3 == 0 { Exchange::Nyse } else { Exchange::Amex };
            Observation::new(i, period(), exchange)
                .with(SortingVariable::MarketEquity, ((i * 37) % 41) as f64)
                .with(SortingVariable::BookToMarket, ((i * 13) % 17) as f64 / 10.0)
        })
        .collect();
    let specs = vec![
        SortSpec::quantiles(SortingVariable::MarketEquity, 5),
        SortSpec::quantiles(SortingVariable::BookToMarket, 5),
    ];

    let first = independent_sort(&observations, &specs).unwrap();
    let second = independent_sort(&observations, &specs).unwrap();
    assert_eq!(first, second);
}

fn population(assignments: &[tidysort_sorts::Assignment]) -> BTreeMap<(u32, u32), usize> {
    let mut counts = BTreeMap::new();
    for a in assignments {
        let key = (
            a.label(SortingVariable::MarketEquity).unwrap(),
            a.label(SortingVariable::BookToMarket).unwrap(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_dependent_and_independent_populations_differ() {
    // bm is correlated with me
    let observations: Vec<Observation> = (1..=30u64)
        .map(|i| {
            Observation::new(i, period(), Exchange::Nyse)
                .with(SortingVariable::MarketEquity, i as f64)
                .with(SortingVariable::BookToMarket, i as f64 / 10.0 + (i % 4) as f64 * 0.05)
        })
        .collect();
    let me = SortSpec::quantiles(SortingVariable::MarketEquity, 3);
    let bm = SortSpec::quantiles(SortingVariable::BookToMarket, 3);

    let independent = independent_sort(&observations, &[me.clone(), bm.clone()]).unwrap();
    let dependent = dependent_sort(&observations, &me, &bm).unwrap();

    let independent_counts = population(&independent);
    let dependent_counts = population(&dependent);
    assert_ne!(independent_counts, dependent_counts);

    // the dependent sort fills all nine combined groups
    assert_eq!(dependent_counts.len(), 9);
    assert!(independent_counts.len() < 9);
}

#[test]
fn test_panel_pipeline_builds_value_factor() {
    let mut observations = Vec::new();
    for (m, shift) in [(1u32, 0.0), (2, 0.01)] {
        let date = NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
        for i in 1..=6u64 {
            observations.push(
                Observation::new(i, date, Exchange::Nyse)
                    .with(SortingVariable::BookToMarket, i as f64)
                    .with_return(0.01 * i as f64 + shift, 1.0),
            );
        }
    }
    let method = SortMethod::Independent(vec![SortSpec::quantiles(
        SortingVariable::BookToMarket,
        3,
    )]);

    let assignments = sort_panel(&observations, &method, PeriodPolicy::Abort).unwrap();
    let returns = portfolio_returns(
        &observations,
        &assignments,
        &[SortingVariable::BookToMarket],
        Weighting::Equal,
        PeriodPolicy::Abort,
    )
    .unwrap();
    let hml = long_short(
        &returns,
        SortingVariable::BookToMarket,
        Leg::Top,
        Leg::Bottom,
        PeriodPolicy::Abort,
    )
    .unwrap();

    assert_eq!(hml.len(), 2);
    for point in hml {
        assert_relative_eq!(point.value, 0.04, epsilon = 1e-12);
    }
}
