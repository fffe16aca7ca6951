//! Typed records of the tidy finance tables.
//!
//! Frames are converted to records once, at ingestion. Everything
//! downstream works on named, typed fields.

use crate::calendar::parse_date;
use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tidysort_sorts::Exchange;

/// One row of `crsp_monthly`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrspMonthly {
    /// CRSP permanent security identifier
    pub permno: u64,
    /// Compustat company identifier linked to the security
    pub gvkey: Option<String>,
    /// Month start
    pub date: NaiveDate,
    /// Excess return over the risk-free rate
    pub ret_excess: Option<f64>,
    /// Market capitalization at month end
    pub mktcap: Option<f64>,
    /// Market capitalization of the previous month
    pub mktcap_lag: Option<f64>,
    /// Primary listing exchange
    pub exchange: Exchange,
}

impl CrspMonthly {
    /// Whether every field the sorting pipelines use is present.
    ///
    /// Rows failing this are dropped before panels are built.
    pub fn is_complete(&self) -> bool {
        self.gvkey.is_some()
            && [self.ret_excess, self.mktcap, self.mktcap_lag]
                .iter()
                .all(|v| v.is_some_and(f64::is_finite))
    }
}

/// One row of `compustat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compustat {
    /// Compustat company identifier
    pub gvkey: String,
    /// Fiscal period end
    pub datadate: NaiveDate,
    /// Book equity
    pub be: Option<f64>,
    /// Operating profitability
    pub op: Option<f64>,
    /// Investment (asset growth)
    pub inv: Option<f64>,
}

impl Compustat {
    /// Whether book equity, profitability and investment are all finite.
    pub fn is_complete(&self) -> bool {
        [self.be, self.op, self.inv]
            .iter()
            .all(|v| v.is_some_and(f64::is_finite))
    }
}

/// One month of published Fama-French factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedFactors {
    /// Month start
    pub date: NaiveDate,
    /// Market excess return
    pub mkt_excess: Option<f64>,
    /// Small minus big
    pub smb: Option<f64>,
    /// High minus low
    pub hml: Option<f64>,
    /// Robust minus weak
    pub rmw: Option<f64>,
    /// Conservative minus aggressive
    pub cma: Option<f64>,
    /// Risk-free rate
    pub rf: Option<f64>,
}

impl PublishedFactors {
    /// Factor value by short name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "mkt_excess" => self.mkt_excess,
            "smb" => self.smb,
            "hml" => self.hml,
            "rmw" => self.rmw,
            "cma" => self.cma,
            "rf" => self.rf,
            _ => None,
        }
    }
}

/// Parse an exchange as stored in the database.
///
/// Accepts names (`NYSE`) and CRSP primary exchange codes (`N`).
pub fn parse_exchange(text: &str) -> Exchange {
    text.parse()
        .unwrap_or_else(|_| Exchange::from_primary_code(text))
}

/// Column reader that materializes typed vectors from a frame.
struct FrameReader<'a> {
    df: &'a DataFrame,
    table: &'a str,
}

impl<'a> FrameReader<'a> {
    const fn new(df: &'a DataFrame, table: &'a str) -> Self {
        Self { df, table }
    }

    fn has(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.df
            .column(name)
            .map_err(|_| DataError::missing_column(self.table, name))
    }

    fn f64s(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.column(name)?.cast(&DataType::Float64)?;
        Ok(col.f64()?.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
    }

    fn optional_f64s(&self, name: &str) -> Result<Vec<Option<f64>>> {
        if self.has(name) {
            self.f64s(name)
        } else {
            Ok(vec![None; self.df.height()])
        }
    }

    fn i64s(&self, name: &str) -> Result<Vec<Option<i64>>> {
        let col = self.column(name)?.cast(&DataType::Int64)?;
        Ok(col.i64()?.into_iter().collect())
    }

    fn strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let col = self.column(name)?.cast(&DataType::String)?;
        Ok(col.str()?.into_iter().map(|s| s.map(str::to_string)).collect())
    }

    fn dates(&self, name: &str) -> Result<Vec<Option<NaiveDate>>> {
        self.strings(name)?
            .into_iter()
            .map(|s| s.as_deref().map(parse_date).transpose())
            .collect()
    }

    fn required<T>(&self, value: Option<T>, row: usize, name: &str) -> Result<T> {
        value.ok_or_else(|| {
            DataError::Parse(format!("{} row {} has no {}", self.table, row, name))
        })
    }
}

fn permno(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| DataError::Parse(format!("invalid permno {}", value)))
}

/// Convert a `crsp_monthly` frame to records.
///
/// Required columns: `permno`, `gvkey`, `date`, `ret_excess`, `mktcap`,
/// `mktcap_lag`, `exchange`. Rows without `permno` or `date` are an error;
/// other fields may be null.
pub fn crsp_monthly_from_frame(df: &DataFrame) -> Result<Vec<CrspMonthly>> {
    let reader = FrameReader::new(df, "crsp_monthly");
    let permnos = reader.i64s("permno")?;
    let gvkeys = reader.strings("gvkey")?;
    let dates = reader.dates("date")?;
    let rets = reader.f64s("ret_excess")?;
    let mktcaps = reader.f64s("mktcap")?;
    let lags = reader.f64s("mktcap_lag")?;
    let exchanges = reader.strings("exchange")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(CrspMonthly {
            permno: permno(reader.required(permnos[i], i, "permno")?)?,
            gvkey: gvkeys[i].clone(),
            date: reader.required(dates[i], i, "date")?,
            ret_excess: rets[i],
            mktcap: mktcaps[i],
            mktcap_lag: lags[i],
            exchange: exchanges[i]
                .as_deref()
                .map_or(Exchange::Other, parse_exchange),
        });
    }

    tracing::debug!(rows = rows.len(), "ingested crsp_monthly");
    Ok(rows)
}

/// Convert a `compustat` frame to records.
///
/// `gvkey`, `datadate` and `be` are required columns; `op` and `inv`
/// are optional.
pub fn compustat_from_frame(df: &DataFrame) -> Result<Vec<Compustat>> {
    let reader = FrameReader::new(df, "compustat");
    let gvkeys = reader.strings("gvkey")?;
    let datadates = reader.dates("datadate")?;
    let be = reader.f64s("be")?;
    let op = reader.optional_f64s("op")?;
    let inv = reader.optional_f64s("inv")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(Compustat {
            gvkey: reader.required(gvkeys[i].clone(), i, "gvkey")?,
            datadate: reader.required(datadates[i], i, "datadate")?,
            be: be[i],
            op: op[i],
            inv: inv[i],
        });
    }

    tracing::debug!(rows = rows.len(), "ingested compustat");
    Ok(rows)
}

/// Convert a published factor frame to records.
///
/// Only `date` is required; absent factor columns stay `None`.
pub fn factors_from_frame(df: &DataFrame) -> Result<Vec<PublishedFactors>> {
    let reader = FrameReader::new(df, "factors");
    let dates = reader.dates("date")?;
    let mkt = reader.optional_f64s("mkt_excess")?;
    let smb = reader.optional_f64s("smb")?;
    let hml = reader.optional_f64s("hml")?;
    let rmw = reader.optional_f64s("rmw")?;
    let cma = reader.optional_f64s("cma")?;
    let rf = reader.optional_f64s("rf")?;

    (0..df.height())
        .map(|i| {
            Ok(PublishedFactors {
                date: reader.required(dates[i], i, "date")?,
                mkt_excess: mkt[i],
                smb: smb[i],
                hml: hml[i],
                rmw: rmw[i],
                cma: cma[i],
                rf: rf[i],
            })
        })
        .collect()
}
