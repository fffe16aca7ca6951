//! Factor and replication summaries.
//!
//! Summaries are plain data with terminal (ASCII) and Markdown renderings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tidysort_sorts::FactorSeries;

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

/// Round to a number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Pearson correlation of two equally long samples.
///
/// `None` for fewer than two pairs, different lengths or a constant
/// sample.
///
/// # Examples
///
/// ```
/// use tidysort_output::pearson_correlation;
///
/// let r = pearson_correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
/// assert!((r - 1.0).abs() < 1e-12);
/// ```
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

/// Time-series statistics of one factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorSummary {
    /// Factor name.
    pub name: String,

    /// Number of periods.
    pub n_periods: usize,

    /// First and last period.
    pub span: Option<(NaiveDate, NaiveDate)>,

    /// Mean return.
    pub mean: Option<f64>,

    /// Sample standard deviation.
    pub std_dev: Option<f64>,

    /// Mean over its standard error.
    pub t_stat: Option<f64>,
}

impl FactorSummary {
    /// Summarize a factor series.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use tidysort_output::FactorSummary;
    /// use tidysort_sorts::{FactorReturn, FactorSeries};
    ///
    /// let points = [0.01, 0.03]
    ///     .into_iter()
    ///     .enumerate()
    ///     .map(|(i, value)| FactorReturn {
    ///         period: NaiveDate::from_ymd_opt(2020, i as u32 + 1, 1).unwrap(),
    ///         value,
    ///     })
    ///     .collect();
    ///
    /// let summary = FactorSummary::from_series(&FactorSeries::new("smb", points));
    /// assert_eq!(summary.n_periods, 2);
    /// assert!((summary.mean.unwrap() - 0.02).abs() < 1e-12);
    /// ```
    pub fn from_series(series: &FactorSeries) -> Self {
        let n = series.len();
        let mean = series.mean();
        let std_dev = mean.filter(|_| n > 1).map(|m| {
            let ss: f64 = series.points.iter().map(|p| (p.value - m).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        let t_stat = match (mean, std_dev) {
            (Some(m), Some(s)) if s > 0.0 => Some(m / (s / (n as f64).sqrt())),
            _ => None,
        };

        Self {
            name: series.name.clone(),
            n_periods: n,
            span: series.span(),
            mean,
            std_dev,
            t_stat,
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn table_to_ascii(summaries: &[Self]) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{:<10} {:>8} {:>12} {:>12} {:>10}  {}\n",
            "Factor", "Periods", "Mean (%)", "Std (%)", "t-stat", "Span"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for s in summaries {
            output.push_str(&format!(
                "{:<10} {:>8} {:>12} {:>12} {:>10}  {}\n",
                s.name,
                s.n_periods,
                fmt_opt(s.mean.map(|m| m * 100.0), 3),
                fmt_opt(s.std_dev.map(|v| v * 100.0), 3),
                fmt_opt(s.t_stat, 2),
                s.span_text()
            ));
        }
        output
    }

    /// Format as Markdown table.
    pub fn table_to_markdown(summaries: &[Self]) -> String {
        let mut output = String::new();
        output.push_str("| Factor | Periods | Mean (%) | Std (%) | t-stat | Span |\n");
        output.push_str("|--------|---------|----------|---------|--------|------|\n");
        for s in summaries {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                s.name,
                s.n_periods,
                fmt_opt(s.mean.map(|m| m * 100.0), 3),
                fmt_opt(s.std_dev.map(|v| v * 100.0), 3),
                fmt_opt(s.t_stat, 2),
                s.span_text()
            ));
        }
        output
    }

    fn span_text(&self) -> String {
        self.span
            .map_or_else(|| "-".to_string(), |(a, b)| format!("{} to {}", a, b))
    }
}

impl fmt::Display for FactorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: mean {}%, t-stat {} over {} periods",
            self.name,
            fmt_opt(self.mean.map(|m| m * 100.0), 3),
            fmt_opt(self.t_stat, 2),
            self.n_periods
        )
    }
}

/// Agreement of one replicated factor with its published counterpart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorComparison {
    /// Factor name.
    pub factor: String,

    /// Periods present in both series.
    pub n_overlap: usize,

    /// Pearson correlation over the overlap.
    pub correlation: Option<f64>,

    /// Mean of the replicated factor over the overlap.
    pub replicated_mean: Option<f64>,

    /// Mean of the published factor over the overlap.
    pub published_mean: Option<f64>,
}

impl FactorComparison {
    /// Compare two series on their common periods.
    ///
    /// Both sides are rounded to `decimals` before the correlation.
    pub fn new(replicated: &FactorSeries, published: &FactorSeries, decimals: i32) -> Self {
        let published_by_date: HashMap<NaiveDate, f64> = published
            .points
            .iter()
            .map(|p| (p.period, p.value))
            .collect();

        let (x, y): (Vec<f64>, Vec<f64>) = replicated
            .points
            .iter()
            .filter_map(|p| {
                published_by_date
                    .get(&p.period)
                    .map(|q| (round_to(p.value, decimals), round_to(*q, decimals)))
            })
            .unzip();

        let mean = |v: &[f64]| (!v.is_empty()).then(|| v.iter().sum::<f64>() / v.len() as f64);

        Self {
            factor: replicated.name.clone(),
            n_overlap: x.len(),
            correlation: pearson_correlation(&x, &y),
            replicated_mean: mean(&x),
            published_mean: mean(&y),
        }
    }
}

/// Replication quality of a set of factors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationSummary {
    /// Study name, e.g. `Fama-French 3`.
    pub name: String,

    /// One comparison per factor.
    pub comparisons: Vec<FactorComparison>,
}

impl ReplicationSummary {
    /// Create a new replication summary.
    pub const fn new(name: String, comparisons: Vec<FactorComparison>) -> Self {
        Self { name, comparisons }
    }

    /// Comparison of one factor.
    pub fn get(&self, factor: &str) -> Option<&FactorComparison> {
        self.comparisons.iter().find(|c| c.factor == factor)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nReplication: {}\n", self.name));
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<10} {:>10} {:>14} {:>16} {:>16}\n",
            "Factor", "Overlap", "Correlation", "Replicated (%)", "Published (%)"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for c in &self.comparisons {
            output.push_str(&format!(
                "{:<10} {:>10} {:>14} {:>16} {:>16}\n",
                c.factor,
                c.n_overlap,
                fmt_opt(c.correlation, 4),
                fmt_opt(c.replicated_mean.map(|m| m * 100.0), 3),
                fmt_opt(c.published_mean.map(|m| m * 100.0), 3)
            ));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Replication: {}\n\n", self.name));
        output.push_str("| Factor | Overlap | Correlation | Replicated (%) | Published (%) |\n");
        output.push_str("|--------|---------|-------------|----------------|---------------|\n");
        for c in &self.comparisons {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                c.factor,
                c.n_overlap,
                fmt_opt(c.correlation, 4),
                fmt_opt(c.replicated_mean.map(|m| m * 100.0), 3),
                fmt_opt(c.published_mean.map(|m| m * 100.0), 3)
            ));
        }

        output
    }
}

impl fmt::Display for ReplicationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Replication: {}", self.name)?;
        for c in &self.comparisons {
            writeln!(
                f,
                "  {}: correlation {} over {} periods",
                c.factor,
                fmt_opt(c.correlation, 4),
                c.n_overlap
            )?;
        }
        Ok(())
    }
}
