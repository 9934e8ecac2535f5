//! Descriptive statistics over the numeric columns of a table.

use color_eyre::Result;
use polars::prelude::*;
use tracing::debug;

/// Per-column descriptive statistics. `count` is the non-null count and
/// `missing` the null count; the two are computed independently.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    pub missing: usize,
}

/// Summary of a table's numeric columns. A table without numeric columns is an
/// explicit variant rather than an empty list.
#[derive(Clone, Debug, PartialEq)]
pub enum SummaryReport {
    Table(Vec<ColumnSummary>),
    NoNumericColumns,
}

/// Non-null values of a numeric series as f64.
fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().flatten().collect())
}

/// Percentile by nearest sorted index; `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let idx = ((p / 100.0) * (n - 1) as f64).round() as usize;
    sorted[idx.min(n - 1)]
}

fn summarize_column(name: &str, series: &Series) -> Result<ColumnSummary> {
    let count = series.len() - series.null_count();
    let missing = series.null_count();
    let mean = series.mean().unwrap_or(f64::NAN);
    let std = series.std(1).unwrap_or(f64::NAN); // Sample std (ddof=1)

    let mut values = numeric_values(series)?;
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (min, q25, median, q75, max) = if values.is_empty() {
        (f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    } else {
        (
            values[0],
            percentile(&values, 25.0),
            percentile(&values, 50.0),
            percentile(&values, 75.0),
            values[values.len() - 1],
        )
    };

    Ok(ColumnSummary {
        name: name.to_string(),
        count,
        mean,
        std,
        min,
        q25,
        median,
        q75,
        max,
        missing,
    })
}

/// Summarizes every numeric column of the table. Nulls are excluded from all
/// statistics; only the missing count sees them.
pub fn summarize(df: &DataFrame) -> Result<SummaryReport> {
    let schema = df.schema();
    let numeric: Vec<String> = schema
        .iter()
        .filter(|(_, dtype)| dtype.is_numeric())
        .map(|(name, _)| name.to_string())
        .collect();

    if numeric.is_empty() {
        return Ok(SummaryReport::NoNumericColumns);
    }

    let mut rows = Vec::with_capacity(numeric.len());
    for name in &numeric {
        let series = df.column(name)?.as_materialized_series();
        rows.push(summarize_column(name, series)?);
    }
    debug!(columns = rows.len(), "summarized numeric columns");
    Ok(SummaryReport::Table(rows))
}

fn fmt_stat(v: f64) -> String {
    if v.is_nan() {
        "-".to_string()
    } else {
        format!("{:.2}", v)
    }
}

/// Renders the report as an aligned text table with 2-decimal statistics.
pub fn format_report(report: &SummaryReport) -> String {
    let rows = match report {
        SummaryReport::NoNumericColumns => {
            return "No numeric columns to summarize.".to_string();
        }
        SummaryReport::Table(rows) => rows,
    };

    const HEADERS: [&str; 10] = [
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max", "missing",
    ];
    let mut cells: Vec<Vec<String>> = vec![HEADERS.iter().map(|h| h.to_string()).collect()];
    for r in rows {
        cells.push(vec![
            r.name.clone(),
            r.count.to_string(),
            fmt_stat(r.mean),
            fmt_stat(r.std),
            fmt_stat(r.min),
            fmt_stat(r.q25),
            fmt_stat(r.median),
            fmt_stat(r.q75),
            fmt_stat(r.max),
            r.missing.to_string(),
        ]);
    }

    let widths: Vec<usize> = (0..HEADERS.len())
        .map(|c| cells.iter().map(|row| row[c].len()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(c, (cell, w))| {
                // Left-align the column name, right-align the numbers.
                if c == 0 {
                    format!("{:<width$}", cell, width = w)
                } else {
                    format!("{:>width$}", cell, width = w)
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}
