//! Prepare chart-ready data for each chart kind: select the bound columns,
//! drop nulls, cast x to f64 (temporal types as ordinal), and split series per
//! color group.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::datatypes::{DataType, TimeUnit};
use polars::prelude::*;
use tracing::debug;

use crate::chart_spec::{ChartKind, ChartSpec};
use crate::classify::{self, ColumnRoles};

/// Describes how x-axis numeric values map to temporal types for label formatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XAxisKind {
    Numeric,
    /// X values are positions into a label vector.
    Category,
    Date,       // x = days since Unix epoch (f64)
    DatetimeUs, // x = microseconds since epoch
    DatetimeMs,
    DatetimeNs,
    Time, // x = nanoseconds since midnight
}

fn x_axis_kind(dtype: &DataType) -> XAxisKind {
    match dtype {
        DataType::Date => XAxisKind::Date,
        DataType::Datetime(unit, _) => match unit {
            TimeUnit::Nanoseconds => XAxisKind::DatetimeNs,
            TimeUnit::Microseconds => XAxisKind::DatetimeUs,
            TimeUnit::Milliseconds => XAxisKind::DatetimeMs,
        },
        DataType::Time => XAxisKind::Time,
        _ => XAxisKind::Numeric,
    }
}

/// One plottable series: a color-group (or the whole table) as (x, y) points.
/// `sizes` is parallel to `points` when a size column is bound.
#[derive(Clone, Debug, PartialEq)]
pub struct XySeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub sizes: Option<Vec<f64>>,
}

/// Histogram bin counts for one color group over the shared bin edges.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramGroup {
    pub name: String,
    pub counts: Vec<u64>,
}

/// Five-number summary for one category of a box plot.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxGroup {
    pub label: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Chart-ready data, one variant per renderer input shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartData {
    /// Line, bar, and scatter. `x_labels` is set when x is a label axis and
    /// point x values index into it.
    Xy {
        series: Vec<XySeries>,
        x_kind: XAxisKind,
        x_labels: Option<Vec<String>>,
    },
    /// Shared bin edges, counts per color group.
    Histogram {
        start: f64,
        bin_width: f64,
        groups: Vec<HistogramGroup>,
    },
    Box {
        groups: Vec<BoxGroup>,
    },
    /// Category label and summed value per slice, sorted by label.
    Pie {
        slices: Vec<(String, f64)>,
    },
    /// Pairwise Pearson correlations over the numeric columns. Symmetric,
    /// 1.0 on the diagonal, NaN where a pair has fewer than 3 paired values.
    Heatmap {
        columns: Vec<String>,
        matrix: Vec<Vec<f64>>,
    },
}

/// Prepares chart data for the given spec. Dispatches exhaustively on the
/// chart kind; rows with a null in any bound column are dropped.
pub fn prepare(df: &DataFrame, roles: &ColumnRoles, spec: &ChartSpec) -> Result<ChartData> {
    let data = match spec.kind {
        ChartKind::Line | ChartKind::Bar | ChartKind::Scatter => prepare_xy(df, roles, spec)?,
        ChartKind::Histogram => prepare_histogram(df, spec)?,
        ChartKind::Box => prepare_box(df, spec)?,
        ChartKind::Pie => prepare_pie(df, spec)?,
        ChartKind::Heatmap => prepare_heatmap(df, roles)?,
    };
    debug!(kind = spec.kind.as_str(), "prepared chart data");
    Ok(data)
}

fn bound(field: Option<&str>, what: &str) -> Result<String> {
    field
        .map(str::to_string)
        .ok_or_else(|| eyre!("no {} column bound", what))
}

/// Column values as f64, null-preserving. Temporal dtypes go through Int64 so
/// dates become day ordinals and datetimes epoch ticks.
fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name)?;
    let casted = match col.dtype() {
        DataType::Date | DataType::Datetime(_, _) | DataType::Time => col
            .cast(&DataType::Int64)?
            .cast(&DataType::Float64)?,
        _ => col.cast(&DataType::Float64)?,
    };
    Ok(casted.f64()?.into_iter().collect())
}

/// Column values as strings, null-preserving.
fn column_as_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Distinct values of a label column in first-appearance order, with a lookup
/// from value to index.
fn label_index(values: &[Option<String>]) -> (Vec<String>, Vec<Option<f64>>) {
    let mut labels: Vec<String> = Vec::new();
    let indexed = values
        .iter()
        .map(|v| {
            v.as_ref().map(|s| {
                match labels.iter().position(|l| l == s) {
                    Some(i) => i as f64,
                    None => {
                        labels.push(s.clone());
                        (labels.len() - 1) as f64
                    }
                }
            })
        })
        .collect();
    (labels, indexed)
}

/// Color-group labels per row, or a single unnamed group when no color column
/// is bound. Rows with a null group are dropped by the callers.
fn group_labels(df: &DataFrame, color: Option<&str>) -> Result<Vec<Option<String>>> {
    match color {
        Some(name) => column_as_str(df, name),
        None => Ok(vec![Some(String::new()); df.height()]),
    }
}

fn prepare_xy(df: &DataFrame, roles: &ColumnRoles, spec: &ChartSpec) -> Result<ChartData> {
    let x_name = bound(spec.x.as_deref(), "x-axis")?;
    let y_name = bound(spec.y.as_deref(), "y-axis")?;

    // A date-probe text column chosen as a line's time axis is reparsed to a
    // real Date column before charting.
    let mut df = df.clone();
    if spec.kind == ChartKind::Line
        && roles.is_datetime(&x_name)
        && !matches!(
            df.column(&x_name)?.dtype(),
            DataType::Date | DataType::Datetime(_, _) | DataType::Time
        )
    {
        classify::reparse_as_date(&mut df, &x_name)?;
    }

    let x_dtype = df.column(&x_name)?.dtype().clone();
    let numeric_x = x_dtype.is_numeric()
        || matches!(x_dtype, DataType::Date | DataType::Datetime(_, _) | DataType::Time);

    let (x_kind, x_labels, xs) = if numeric_x {
        (x_axis_kind(&x_dtype), None, column_as_f64(&df, &x_name)?)
    } else {
        let raw = column_as_str(&df, &x_name)?;
        let (labels, indexed) = label_index(&raw);
        (XAxisKind::Category, Some(labels), indexed)
    };

    let ys = column_as_f64(&df, &y_name)?;
    let sizes = match spec.size.as_deref() {
        Some(name) => Some(column_as_f64(&df, name)?),
        None => None,
    };
    let groups = group_labels(&df, spec.color.as_deref())?;

    let mut series: Vec<XySeries> = Vec::new();
    for i in 0..df.height() {
        let (Some(x), Some(y), Some(g)) = (xs[i], ys[i], groups[i].as_ref()) else {
            continue;
        };
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let size = match &sizes {
            Some(vals) => match vals[i] {
                Some(s) if s.is_finite() => Some(s),
                _ => continue,
            },
            None => None,
        };
        let idx = match series.iter().position(|s| &s.name == g) {
            Some(idx) => idx,
            None => {
                series.push(XySeries {
                    name: g.clone(),
                    points: Vec::new(),
                    sizes: sizes.as_ref().map(|_| Vec::new()),
                });
                series.len() - 1
            }
        };
        series[idx].points.push((x, y));
        if let (Some(sz), Some(v)) = (series[idx].sizes.as_mut(), size) {
            sz.push(v);
        }
    }

    // Lines read left to right.
    if spec.kind == ChartKind::Line {
        for s in &mut series {
            s.points
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    Ok(ChartData::Xy {
        series,
        x_kind,
        x_labels,
    })
}

fn prepare_histogram(df: &DataFrame, spec: &ChartSpec) -> Result<ChartData> {
    let x_name = bound(spec.x.as_deref(), "value")?;
    let bins = spec.bins.ok_or_else(|| eyre!("no bin count bound"))? as usize;

    let xs = column_as_f64(df, &x_name)?;
    let groups = group_labels(df, spec.color.as_deref())?;

    // Shared edges over the rows that will actually be counted, so a row with
    // a null group value cannot widen the bins.
    let finite: Vec<f64> = xs
        .iter()
        .zip(&groups)
        .filter_map(|(x, g)| match (x, g) {
            (Some(x), Some(_)) if x.is_finite() => Some(*x),
            _ => None,
        })
        .collect();
    if finite.is_empty() {
        return Ok(ChartData::Histogram {
            start: 0.0,
            bin_width: 1.0,
            groups: Vec::new(),
        });
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bin_width = if max > min { (max - min) / bins as f64 } else { 1.0 };

    let mut out: Vec<HistogramGroup> = Vec::new();
    for i in 0..df.height() {
        let (Some(x), Some(g)) = (xs[i], groups[i].as_ref()) else {
            continue;
        };
        if !x.is_finite() {
            continue;
        }
        let idx = (((x - min) / bin_width) as usize).min(bins - 1);
        let gi = match out.iter().position(|h| &h.name == g) {
            Some(gi) => gi,
            None => {
                out.push(HistogramGroup {
                    name: g.clone(),
                    counts: vec![0; bins],
                });
                out.len() - 1
            }
        };
        out[gi].counts[idx] += 1;
    }

    Ok(ChartData::Histogram {
        start: min,
        bin_width,
        groups: out,
    })
}

/// Percentile by nearest sorted index; `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let idx = ((p / 100.0) * (n - 1) as f64).round() as usize;
    sorted[idx.min(n - 1)]
}

fn prepare_box(df: &DataFrame, spec: &ChartSpec) -> Result<ChartData> {
    let x_name = bound(spec.x.as_deref(), "category")?;
    let y_name = bound(spec.y.as_deref(), "value")?;

    let labels = column_as_str(df, &x_name)?;
    let ys = column_as_f64(df, &y_name)?;

    let mut buckets: Vec<(String, Vec<f64>)> = Vec::new();
    for i in 0..df.height() {
        let (Some(label), Some(y)) = (labels[i].as_ref(), ys[i]) else {
            continue;
        };
        if !y.is_finite() {
            continue;
        }
        match buckets.iter_mut().find(|(l, _)| l == label) {
            Some((_, vals)) => vals.push(y),
            None => buckets.push((label.clone(), vec![y])),
        }
    }

    let mut groups = Vec::with_capacity(buckets.len());
    for (label, mut vals) in buckets {
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        groups.push(BoxGroup {
            label,
            min: vals[0],
            q1: percentile(&vals, 25.0),
            median: percentile(&vals, 50.0),
            q3: percentile(&vals, 75.0),
            max: vals[vals.len() - 1],
        });
    }
    groups.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(ChartData::Box { groups })
}

/// Pie rows are grouped by the category column and the value column summed per
/// group before the renderer sees them.
fn prepare_pie(df: &DataFrame, spec: &ChartSpec) -> Result<ChartData> {
    let x_name = bound(spec.x.as_deref(), "category")?;
    let y_name = bound(spec.y.as_deref(), "value")?;

    let agg = df
        .clone()
        .lazy()
        .group_by([col(x_name.as_str())])
        .agg([col(y_name.as_str()).cast(DataType::Float64).sum()])
        .collect()?;

    let labels = column_as_str(&agg, &x_name)?;
    let sums = column_as_f64(&agg, &y_name)?;

    let mut slices: Vec<(String, f64)> = labels
        .into_iter()
        .zip(sums)
        .filter_map(|(label, sum)| Some((label?, sum?)))
        .collect();
    slices.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(ChartData::Pie { slices })
}

fn prepare_heatmap(df: &DataFrame, roles: &ColumnRoles) -> Result<ChartData> {
    let columns = roles.numeric.clone();
    if columns.len() < 2 {
        return Err(eyre!("need at least 2 numeric columns for a heatmap"));
    }

    let n = columns.len();
    let mut matrix = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let a = df.column(&columns[i])?;
            let b = df.column(&columns[j])?;
            // Drop rows where either side is null so the pair stays aligned.
            let mask = a.is_not_null() & b.is_not_null();
            let a = a.filter(&mask)?;
            let b = b.filter(&mask)?;
            let r = if a.len() < 3 {
                f64::NAN
            } else {
                pearson(
                    a.as_materialized_series(),
                    b.as_materialized_series(),
                )?
            };
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    Ok(ChartData::Heatmap { columns, matrix })
}

fn pearson(a: &Series, b: &Series) -> Result<f64> {
    let xs: Vec<f64> = a
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect();
    let ys: Vec<f64> = b
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect();
    if xs.len() != ys.len() || xs.len() < 2 {
        return Err(eyre!("invalid data for correlation"));
    }

    let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;
    let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
    let numerator: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let var_x: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    let var_y: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    if var_x == 0.0 || var_y == 0.0 {
        return Ok(0.0);
    }
    Ok(numerator / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_spec::{configure, ChartConfig, Selection};
    use crate::classify::classify;

    fn spec_for(df: &DataFrame, kind: ChartKind, sel: Selection) -> ChartSpec {
        let roles = classify(df);
        let all: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        match configure(kind, &roles, &all, &sel) {
            ChartConfig::Ready(spec) => spec,
            ChartConfig::Invalid(msg) => panic!("configure failed: {}", msg),
        }
    }

    #[test]
    fn scatter_points_and_nulls_dropped() {
        let df = df!(
            "a" => &[Some(1.0_f64), Some(2.0), None],
            "b" => &[Some(10.0_f64), Some(20.0), Some(30.0)]
        )
        .unwrap();
        let spec = spec_for(&df, ChartKind::Scatter, Selection::default());
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Xy { series, .. } => {
                assert_eq!(series.len(), 1);
                assert_eq!(series[0].points, vec![(1.0, 10.0), (2.0, 20.0)]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn color_column_splits_series() {
        let df = df!(
            "x" => &[1i64, 2, 3, 4],
            "y" => &[10i64, 20, 30, 40],
            "grp" => &["a", "b", "a", "b"]
        )
        .unwrap();
        let sel = Selection {
            color: Some("grp".into()),
            ..Default::default()
        };
        let spec = spec_for(&df, ChartKind::Scatter, sel);
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Xy { series, .. } => {
                assert_eq!(series.len(), 2);
                assert_eq!(series[0].name, "a");
                assert_eq!(series[0].points, vec![(1.0, 10.0), (3.0, 30.0)]);
                assert_eq!(series[1].points, vec![(2.0, 20.0), (4.0, 40.0)]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn line_reparses_text_dates_and_sorts() {
        let df = df!(
            "when" => &["2024-01-03", "2024-01-01", "2024-01-02"],
            "v" => &[3i64, 1, 2]
        )
        .unwrap();
        let spec = spec_for(&df, ChartKind::Line, Selection::default());
        assert_eq!(spec.x.as_deref(), Some("when"));
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Xy {
                series, x_kind, ..
            } => {
                assert_eq!(x_kind, XAxisKind::Date);
                let ys: Vec<f64> = series[0].points.iter().map(|p| p.1).collect();
                assert_eq!(ys, vec![1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn bar_with_text_x_gets_label_axis() {
        let df = df!(
            "region" => &["West", "East", "West"],
            "v" => &[1i64, 2, 3]
        )
        .unwrap();
        let sel = Selection {
            x: Some("region".into()),
            ..Default::default()
        };
        let spec = spec_for(&df, ChartKind::Bar, sel);
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Xy {
                series,
                x_kind,
                x_labels,
            } => {
                assert_eq!(x_kind, XAxisKind::Category);
                assert_eq!(x_labels.unwrap(), vec!["West", "East"]);
                assert_eq!(series[0].points, vec![(0.0, 1.0), (1.0, 2.0), (0.0, 3.0)]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn pie_sums_values_per_category() {
        let df = df!(
            "cat" => &["A", "A", "B"],
            "v" => &[10i64, 20, 5]
        )
        .unwrap();
        let spec = spec_for(&df, ChartKind::Pie, Selection::default());
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Pie { slices } => {
                assert_eq!(slices, vec![("A".into(), 30.0), ("B".into(), 5.0)]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn histogram_counts_cover_all_values() {
        let df = df!("v" => &[1.0_f64, 2.0, 3.0, 4.0, 10.0]).unwrap();
        let sel = Selection {
            bins: Some(5),
            ..Default::default()
        };
        let spec = spec_for(&df, ChartKind::Histogram, sel);
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Histogram { groups, .. } => {
                assert_eq!(groups.len(), 1);
                let total: u64 = groups[0].counts.iter().sum();
                assert_eq!(total, 5);
                assert_eq!(groups[0].counts.len(), 5);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn histogram_color_groups_share_bin_edges() {
        let df = df!(
            "v" => &[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0],
            "grp" => &["a", "a", "a", "b", "b", "b"]
        )
        .unwrap();
        let sel = Selection {
            bins: Some(5),
            color: Some("grp".into()),
            ..Default::default()
        };
        let spec = spec_for(&df, ChartKind::Histogram, sel);
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Histogram {
                start,
                bin_width,
                groups,
            } => {
                assert_eq!(start, 1.0);
                assert!((bin_width - 1.0).abs() < 1e-12);
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].name, "a");
                assert_eq!(groups[1].name, "b");
                for g in &groups {
                    assert_eq!(g.counts.len(), 5);
                    assert_eq!(g.counts.iter().sum::<u64>(), 3);
                }
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn histogram_edges_ignore_rows_without_a_group() {
        let df = df!(
            "v" => &[1.0_f64, 2.0, 3.0, 100.0],
            "grp" => &[Some("a"), Some("a"), Some("a"), None]
        )
        .unwrap();
        let sel = Selection {
            bins: Some(5),
            color: Some("grp".into()),
            ..Default::default()
        };
        let spec = spec_for(&df, ChartKind::Histogram, sel);
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Histogram {
                start,
                bin_width,
                groups,
            } => {
                // The ungrouped 100.0 row is dropped before the edges are set.
                assert_eq!(start, 1.0);
                assert!((bin_width - (3.0 - 1.0) / 5.0).abs() < 1e-12);
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].counts.iter().sum::<u64>(), 3);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn box_quartiles_per_category() {
        let df = df!(
            "cat" => &["a", "a", "a", "a", "a", "b"],
            "v" => &[1i64, 2, 3, 4, 5, 7]
        )
        .unwrap();
        let spec = spec_for(&df, ChartKind::Box, Selection::default());
        let roles = classify(&df);
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Box { groups } => {
                assert_eq!(groups.len(), 2);
                let a = &groups[0];
                assert_eq!(a.label, "a");
                assert_eq!(a.min, 1.0);
                assert_eq!(a.median, 3.0);
                assert_eq!(a.max, 5.0);
                assert_eq!(groups[1].median, 7.0);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn heatmap_matrix_symmetric_with_unit_diagonal() {
        let df = df!(
            "a" => &[1.0_f64, 2.0, 3.0, 4.0],
            "b" => &[2.0_f64, 4.0, 6.0, 8.0],
            "c" => &[4.0_f64, 3.0, 2.0, 1.0]
        )
        .unwrap();
        let roles = classify(&df);
        let spec = spec_for(&df, ChartKind::Heatmap, Selection::default());
        match prepare(&df, &roles, &spec).unwrap() {
            ChartData::Heatmap { columns, matrix } => {
                assert_eq!(columns, vec!["a", "b", "c"]);
                for i in 0..3 {
                    assert!((matrix[i][i] - 1.0).abs() < 1e-12);
                    for j in 0..3 {
                        assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-12);
                    }
                }
                assert!((matrix[0][1] - 1.0).abs() < 1e-9);
                assert!((matrix[0][2] + 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
