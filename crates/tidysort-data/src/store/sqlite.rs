//! SQLite store of the tidy finance tables.

use crate::calendar::{date_from_epoch_days, parse_date};
use crate::error::{DataError, Result};
use crate::ingest::{
    Compustat, CrspMonthly, PublishedFactors, compustat_from_frame, crsp_monthly_from_frame,
    factors_from_frame,
};
use chrono::NaiveDate;
use polars::prelude::*;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Published factor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorTable {
    /// `factors_ff3_monthly`
    Ff3Monthly,
    /// `factors_ff5_monthly`
    Ff5Monthly,
}

impl FactorTable {
    /// Table name in the database.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Ff3Monthly => "factors_ff3_monthly",
            Self::Ff5Monthly => "factors_ff5_monthly",
        }
    }

    /// Factor columns of the table, excluding `date`.
    pub const fn factor_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Ff3Monthly => &["mkt_excess", "smb", "hml", "rf"],
            Self::Ff5Monthly => &["mkt_excess", "smb", "hml", "rmw", "cma", "rf"],
        }
    }
}

impl fmt::Display for FactorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// Inventory entry of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Number of rows
    pub n_rows: usize,
    /// Column names in schema order
    pub columns: Vec<String>,
    /// Whether any column is part of the primary key
    pub has_primary_key: bool,
    /// Rough in-memory size, 8 bytes per cell
    pub estimated_size_bytes: usize,
}

/// Sample size of CRSP in a date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermnoCount {
    /// Distinct securities
    pub unique_permnos: usize,
    /// Distinct security-month pairs
    pub unique_permno_dates: usize,
}

/// Read a date stored as ISO text or as days since the epoch.
fn sql_date(value: ValueRef<'_>) -> Result<Option<NaiveDate>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DataError::Parse(format!("date is not UTF-8: {}", e)))?;
            // numbers land as text in TEXT-affinity columns
            match text.trim().parse::<i64>() {
                Ok(days) => date_from_epoch_days(days).map(Some),
                Err(_) => parse_date(text).map(Some),
            }
        }
        ValueRef::Integer(days) => date_from_epoch_days(days).map(Some),
        ValueRef::Real(days) => date_from_epoch_days(days as i64).map(Some),
        ValueRef::Blob(_) => Err(DataError::Parse("date stored as blob".into())),
    }
}

/// Read an identifier stored as text or number.
fn sql_key(value: ValueRef<'_>) -> Result<Option<String>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => Ok(Some(String::from_utf8_lossy(bytes).trim().to_string())),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(r) => Ok(Some(format!("{}", r as i64))),
        ValueRef::Blob(_) => Err(DataError::Parse("identifier stored as blob".into())),
    }
}

fn sql_permno(value: ValueRef<'_>) -> Result<Option<i64>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i)),
        ValueRef::Real(r) => Ok(Some(r as i64)),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes)
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DataError::Parse(format!("invalid permno: {}", e))),
        ValueRef::Blob(_) => Err(DataError::Parse("permno stored as blob".into())),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn date_strings(dates: Vec<Option<NaiveDate>>) -> Vec<Option<String>> {
    dates.into_iter().map(|d| d.map(|d| d.to_string())).collect()
}

/// SQLite database holding CRSP, Compustat and published factor tables.
#[derive(Debug)]
pub struct TidyFinanceDb {
    conn: Connection,
}

impl TidyFinanceDb {
    /// Open (or create) a database file.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Create missing tables. Existing tables are left untouched.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS crsp_monthly (
                permno INTEGER NOT NULL,
                gvkey TEXT,
                date TEXT NOT NULL,
                ret_excess REAL,
                mktcap REAL,
                mktcap_lag REAL,
                exchange TEXT,
                PRIMARY KEY (permno, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS compustat (
                gvkey TEXT NOT NULL,
                datadate TEXT NOT NULL,
                be REAL,
                op REAL,
                inv REAL,
                PRIMARY KEY (gvkey, datadate)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS factors_ff3_monthly (
                date TEXT PRIMARY KEY,
                mkt_excess REAL,
                smb REAL,
                hml REAL,
                rf REAL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS factors_ff5_monthly (
                date TEXT PRIMARY KEY,
                mkt_excess REAL,
                smb REAL,
                hml REAL,
                rmw REAL,
                cma REAL,
                rf REAL
            )",
            [],
        )?;

        Ok(())
    }

    /// Store CRSP monthly rows.
    pub fn put_crsp_monthly(&self, rows: &[CrspMonthly]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO crsp_monthly
                 (permno, gvkey, date, ret_excess, mktcap, mktcap_lag, exchange)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.permno as i64,
                    row.gvkey,
                    row.date.to_string(),
                    row.ret_excess,
                    row.mktcap,
                    row.mktcap_lag,
                    row.exchange.name()
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!(rows = rows.len(), "stored crsp_monthly");
        Ok(())
    }

    /// Store Compustat rows.
    pub fn put_compustat(&self, rows: &[Compustat]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO compustat (gvkey, datadate, be, op, inv)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.gvkey, row.datadate.to_string(), row.be, row.op, row.inv],
            )?;
        }

        tx.commit()?;
        tracing::debug!(rows = rows.len(), "stored compustat");
        Ok(())
    }

    /// Store published factors.
    pub fn put_factors(&self, table: FactorTable, rows: &[PublishedFactors]) -> Result<()> {
        let columns = table.factor_columns();
        let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} (date, {}) VALUES ({})",
            table.table_name(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let mut values: Vec<rusqlite::types::Value> = vec![row.date.to_string().into()];
                values.extend(columns.iter().map(|c| row.get(c).into()));
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;

        tracing::debug!(rows = rows.len(), %table, "stored factors");
        Ok(())
    }

    /// Load `crsp_monthly` as a frame with a `Date`-typed `date` column.
    pub fn crsp_monthly_frame(&self) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT permno, gvkey, date, ret_excess, mktcap, mktcap_lag, exchange
             FROM crsp_monthly",
        )?;

        let mut permnos = Vec::new();
        let mut gvkeys = Vec::new();
        let mut dates = Vec::new();
        let mut rets = Vec::new();
        let mut mktcaps = Vec::new();
        let mut lags = Vec::new();
        let mut exchanges = Vec::new();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            permnos.push(sql_permno(row.get_ref(0)?)?);
            gvkeys.push(sql_key(row.get_ref(1)?)?);
            dates.push(sql_date(row.get_ref(2)?)?);
            rets.push(row.get::<_, Option<f64>>(3)?);
            mktcaps.push(row.get::<_, Option<f64>>(4)?);
            lags.push(row.get::<_, Option<f64>>(5)?);
            exchanges.push(row.get::<_, Option<String>>(6)?);
        }

        let df = DataFrame::new(vec![
            Series::new("permno".into(), permnos).into(),
            Series::new("gvkey".into(), gvkeys).into(),
            Series::new("date".into(), date_strings(dates)).into(),
            Series::new("ret_excess".into(), rets).into(),
            Series::new("mktcap".into(), mktcaps).into(),
            Series::new("mktcap_lag".into(), lags).into(),
            Series::new("exchange".into(), exchanges).into(),
        ])?;

        // Convert date strings to Date type
        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        tracing::info!(rows = df.height(), "loaded crsp_monthly");
        Ok(df)
    }

    /// Load `compustat` as a frame with a `Date`-typed `datadate` column.
    pub fn compustat_frame(&self) -> Result<DataFrame> {
        let mut stmt = self
            .conn
            .prepare("SELECT gvkey, datadate, be, op, inv FROM compustat")?;

        let mut gvkeys = Vec::new();
        let mut datadates = Vec::new();
        let mut be = Vec::new();
        let mut op = Vec::new();
        let mut inv = Vec::new();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            gvkeys.push(sql_key(row.get_ref(0)?)?);
            datadates.push(sql_date(row.get_ref(1)?)?);
            be.push(row.get::<_, Option<f64>>(2)?);
            op.push(row.get::<_, Option<f64>>(3)?);
            inv.push(row.get::<_, Option<f64>>(4)?);
        }

        let df = DataFrame::new(vec![
            Series::new("gvkey".into(), gvkeys).into(),
            Series::new("datadate".into(), date_strings(datadates)).into(),
            Series::new("be".into(), be).into(),
            Series::new("op".into(), op).into(),
            Series::new("inv".into(), inv).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(col("datadate").cast(DataType::Date))
            .collect()?;

        tracing::info!(rows = df.height(), "loaded compustat");
        Ok(df)
    }

    /// Load a published factor table as a frame.
    pub fn factors_frame(&self, table: FactorTable) -> Result<DataFrame> {
        let columns = table.factor_columns();
        let sql = format!(
            "SELECT date, {} FROM {} ORDER BY date",
            columns.join(", "),
            table.table_name()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let mut dates = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            dates.push(sql_date(row.get_ref(0)?)?);
            for (j, column) in values.iter_mut().enumerate() {
                column.push(row.get::<_, Option<f64>>(j + 1)?);
            }
        }

        let mut series: Vec<Column> = vec![Series::new("date".into(), date_strings(dates)).into()];
        for (name, column) in columns.iter().zip(values) {
            series.push(Series::new((*name).into(), column).into());
        }

        let df = DataFrame::new(series)?
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        tracing::info!(rows = df.height(), %table, "loaded factors");
        Ok(df)
    }

    /// Load `crsp_monthly` as typed records.
    pub fn load_crsp_monthly(&self) -> Result<Vec<CrspMonthly>> {
        crsp_monthly_from_frame(&self.crsp_monthly_frame()?)
    }

    /// Load `compustat` as typed records.
    pub fn load_compustat(&self) -> Result<Vec<Compustat>> {
        compustat_from_frame(&self.compustat_frame()?)
    }

    /// Load a published factor table as typed records.
    pub fn load_factors(&self, table: FactorTable) -> Result<Vec<PublishedFactors>> {
        factors_from_frame(&self.factors_frame(table)?)
    }

    /// Inventory of every table, sorted by name.
    pub fn table_info(&self) -> Result<Vec<TableInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let n_rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
                [],
                |row| row.get(0),
            )?;

            let mut pragma = self
                .conn
                .prepare(&format!("PRAGMA table_info({})", quote_ident(&name)))?;
            let schema = pragma
                .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let columns: Vec<String> = schema.iter().map(|(c, _)| c.clone()).collect();
            let has_primary_key = schema.iter().any(|(_, pk)| *pk > 0);
            let n_rows = n_rows as usize;

            tables.push(TableInfo {
                estimated_size_bytes: n_rows * columns.len() * 8,
                name,
                n_rows,
                columns,
                has_primary_key,
            });
        }

        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    /// Count distinct PERMNOs and PERMNO-months with `start <= date <= end`.
    pub fn count_permnos(&self, start: NaiveDate, end: NaiveDate) -> Result<PermnoCount> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let mut stmt = self.conn.prepare("SELECT permno, date FROM crsp_monthly")?;
        let mut permnos = HashSet::new();
        let mut pairs = HashSet::new();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let (Some(permno), Some(date)) =
                (sql_permno(row.get_ref(0)?)?, sql_date(row.get_ref(1)?)?)
            else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            permnos.insert(permno);
            pairs.insert((permno, date));
        }

        Ok(PermnoCount {
            unique_permnos: permnos.len(),
            unique_permno_dates: pairs.len(),
        })
    }

    /// Rebuild the database file to reclaim free pages.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        tracing::info!("vacuumed database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidysort_sorts::Exchange;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn crsp(permno: u64, date: NaiveDate) -> CrspMonthly {
        CrspMonthly {
            permno,
            gvkey: Some(format!("{:06}", permno)),
            date,
            ret_excess: Some(0.01),
            mktcap: Some(100.0),
            mktcap_lag: Some(95.0),
            exchange: Exchange::Nyse,
        }
    }

    #[test]
    fn test_database_initialization() {
        let db = TidyFinanceDb::in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_table_info() {
        let db = TidyFinanceDb::in_memory().unwrap();
        db.put_crsp_monthly(&[crsp(1, d(2020, 1)), crsp(1, d(2020, 2))])
            .unwrap();

        let tables = db.table_info().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["compustat", "crsp_monthly", "factors_ff3_monthly", "factors_ff5_monthly"]
        );

        let crsp_info = &tables[1];
        assert_eq!(crsp_info.n_rows, 2);
        assert_eq!(crsp_info.columns.len(), 7);
        assert!(crsp_info.has_primary_key);
        assert_eq!(crsp_info.estimated_size_bytes, 2 * 7 * 8);
    }

    #[test]
    fn test_count_permnos() {
        let db = TidyFinanceDb::in_memory().unwrap();
        db.put_crsp_monthly(&[
            crsp(1, d(2014, 1)),
            crsp(1, d(2014, 2)),
            crsp(2, d(2014, 2)),
            crsp(3, d(2025, 1)),
        ])
        .unwrap();

        let count = db.count_permnos(d(2014, 1), d(2024, 6)).unwrap();
        assert_eq!(count.unique_permnos, 2);
        assert_eq!(count.unique_permno_dates, 3);

        assert!(db.count_permnos(d(2024, 6), d(2014, 1)).is_err());
    }

    #[test]
    fn test_crsp_frame_round_trip() {
        let db = TidyFinanceDb::in_memory().unwrap();
        let mut row = crsp(10001, d(2020, 1));
        row.ret_excess = None;
        db.put_crsp_monthly(&[row.clone()]).unwrap();

        let df = db.crsp_monthly_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);

        let rows = crate::ingest::crsp_monthly_from_frame(&df).unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_epoch_day_dates_are_read() {
        let db = TidyFinanceDb::in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO compustat (gvkey, datadate, be) VALUES ('001000', 18262, 5.0)",
                [],
            )
            .unwrap();

        let rows = crate::ingest::compustat_from_frame(&db.compustat_frame().unwrap()).unwrap();
        assert_eq!(rows[0].datadate, d(2020, 1));
        assert_eq!(rows[0].be, Some(5.0));
    }

    #[test]
    fn test_factors_round_trip() {
        let db = TidyFinanceDb::in_memory().unwrap();
        let rows = vec![PublishedFactors {
            date: d(2020, 1),
            smb: Some(0.01),
            hml: Some(-0.02),
            rmw: Some(0.03),
            ..Default::default()
        }];
        db.put_factors(FactorTable::Ff3Monthly, &rows).unwrap();
        db.put_factors(FactorTable::Ff5Monthly, &rows).unwrap();

        let ff3 = crate::ingest::factors_from_frame(
            &db.factors_frame(FactorTable::Ff3Monthly).unwrap(),
        )
        .unwrap();
        assert_eq!(ff3[0].smb, Some(0.01));
        assert_eq!(ff3[0].rmw, None);

        let ff5 = crate::ingest::factors_from_frame(
            &db.factors_frame(FactorTable::Ff5Monthly).unwrap(),
        )
        .unwrap();
        assert_eq!(ff5[0].rmw, Some(0.03));
    }

    #[test]
    fn test_vacuum() {
        let db = TidyFinanceDb::in_memory().unwrap();
        assert!(db.vacuum().is_ok());
    }
}
