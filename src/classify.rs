//! Partition a table's columns into numeric, categorical, and datetime roles.
//!
//! The datetime set includes any text column whose values all pass a permissive
//! date-parse probe, so a column may appear in both the categorical and datetime
//! sets. Which role is offered where is the chart configurator's decision.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

/// Column names grouped by inferred role. Order follows the table's schema.
/// Recomputed fresh from the current table on every pass; never cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
}

impl ColumnRoles {
    pub fn has_datetime(&self) -> bool {
        !self.datetime.is_empty()
    }

    pub fn is_datetime(&self, name: &str) -> bool {
        self.datetime.iter().any(|c| c == name)
    }
}

/// Date/datetime formats accepted by the lenient probe, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Best-effort parse of a single value as a date or datetime.
/// Total function: unparseable input is `None`, never an error.
pub fn parse_datetime_lenient(value: &str) -> Option<NaiveDateTime> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_numeric()
}

fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(..))
}

fn is_temporal_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Date | DataType::Datetime(_, _) | DataType::Time
    )
}

/// True when every non-null value of a string column passes the date probe.
/// At least one non-null value is required; parse failures just exclude the column.
fn all_values_date_parseable(ca: &StringChunked) -> bool {
    let mut seen = false;
    for value in ca.into_iter().flatten() {
        if parse_datetime_lenient(value).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

/// Classifies every column of the table into {numeric, categorical, datetime}.
///
/// A column is numeric if its dtype is numeric; categorical if textual; datetime
/// if its dtype is temporal or, regardless of dtype, if all its values pass the
/// date probe. The sets may overlap (textual, fully date-parseable columns).
pub fn classify(df: &DataFrame) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    let schema = df.schema();

    for (name, dtype) in schema.iter() {
        let name = name.to_string();
        if is_numeric_dtype(dtype) {
            roles.numeric.push(name.clone());
        }
        if is_categorical_dtype(dtype) {
            roles.categorical.push(name.clone());
        }
        if is_temporal_dtype(dtype) {
            roles.datetime.push(name.clone());
        } else if let Ok(col) = df.column(&name) {
            // Probe any non-temporal column whose values can be read as text.
            if let Ok(ca) = col.cast(&DataType::String) {
                if let Ok(ca) = ca.str() {
                    if all_values_date_parseable(ca) {
                        roles.datetime.push(name.clone());
                    }
                }
            }
        }
    }

    debug!(
        numeric = roles.numeric.len(),
        categorical = roles.categorical.len(),
        datetime = roles.datetime.len(),
        "classified columns"
    );
    roles
}

/// Reparses a date-probe column's text values into a Date column, in place.
/// Values that fail the probe become null. Used when a datetime-set column is
/// chosen as a time axis before charting.
pub fn reparse_as_date(df: &mut DataFrame, name: &str) -> PolarsResult<()> {
    let dtype = df.column(name)?.dtype().clone();
    if is_temporal_dtype(&dtype) {
        return Ok(());
    }
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| {
        PolarsError::ComputeError("invalid epoch".into())
    })?;
    let ca = df.column(name)?.cast(&DataType::String)?;
    let ca = ca.str()?;
    let days: Vec<Option<i32>> = ca
        .into_iter()
        .map(|v| {
            v.and_then(parse_datetime_lenient)
                .map(|dt| (dt.date() - epoch).num_days() as i32)
        })
        .collect();
    let parsed = Series::new(name.into(), days).cast(&DataType::Date)?;
    df.with_column(parsed)?;
    Ok(())
}
