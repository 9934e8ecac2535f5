//! Render prepared chart data to a PNG file (plotters bitmap backend).

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::debug;

use crate::chart_data::{BoxGroup, ChartData, XAxisKind, XySeries};
use crate::chart_spec::{ChartKind, ChartSpec};

/// Output image size and labels for rendering.
pub struct ExportOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

/// Fixed series palette, cycled when there are more groups than colors.
const PALETTE: [RGBColor; 7] = [
    CYAN,
    MAGENTA,
    GREEN,
    YELLOW,
    BLUE,
    RED,
    RGBColor(128, 255, 255),
];

fn palette(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// Formats an x value for axis labels according to the axis kind.
fn format_x_value(kind: XAxisKind, labels: Option<&[String]>, v: f64) -> String {
    match kind {
        XAxisKind::Category => {
            let idx = v.round() as usize;
            match labels.and_then(|l| l.get(idx)) {
                // Only label whole positions, so ticks between bars stay blank.
                Some(label) if (v - v.round()).abs() < 1e-9 => label.clone(),
                _ => String::new(),
            }
        }
        XAxisKind::Date => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(v as i64)))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format!("{}", v)),
        XAxisKind::DatetimeMs => format_epoch_millis(v as i64),
        XAxisKind::DatetimeUs => format_epoch_millis(v as i64 / 1_000),
        XAxisKind::DatetimeNs => format_epoch_millis(v as i64 / 1_000_000),
        XAxisKind::Time => {
            let secs = (v / 1e9) as u32;
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        }
        XAxisKind::Numeric => {
            if (v - v.round()).abs() < 1e-9 {
                format!("{:.0}", v)
            } else {
                format!("{:.2}", v)
            }
        }
    }
}

fn format_epoch_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{}", ms))
}

/// Writes the chart to `path` as a PNG. The spec's kind decides the drawing
/// style; `data` must be the variant `prepare` produced for that kind.
pub fn write_chart_png(
    path: &Path,
    spec: &ChartSpec,
    data: &ChartData,
    opts: &ExportOptions,
) -> Result<()> {
    let root = BitMapBackend::new(path, (opts.width, opts.height)).into_drawing_area();
    root.fill(&WHITE)?;

    match data {
        ChartData::Xy {
            series,
            x_kind,
            x_labels,
        } => draw_xy(&root, spec, series, *x_kind, x_labels.as_deref(), opts)?,
        ChartData::Histogram {
            start,
            bin_width,
            groups,
        } => draw_histogram(&root, *start, *bin_width, groups, opts)?,
        ChartData::Box { groups } => draw_box(&root, groups, opts)?,
        ChartData::Pie { slices } => draw_pie(&root, slices, opts)?,
        ChartData::Heatmap { columns, matrix } => draw_heatmap(&root, columns, matrix, opts)?,
    }

    root.present()?;
    debug!(path = %path.display(), "wrote chart");
    Ok(())
}

type Root<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn padded(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    } else {
        (min - 1.0, max + 1.0)
    }
}

fn draw_xy(
    root: &Root,
    spec: &ChartSpec,
    series: &[XySeries],
    x_kind: XAxisKind,
    x_labels: Option<&[String]>,
    opts: &ExportOptions,
) -> Result<()> {
    if series.iter().all(|s| s.points.is_empty()) {
        return Err(eyre!("no data to export"));
    }

    let points = series.iter().flat_map(|s| s.points.iter());
    let x_min = points
        .clone()
        .map(|p| p.0)
        .fold(f64::INFINITY, f64::min);
    let x_max = points
        .clone()
        .map(|p| p.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.clone().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let (x_min, x_max) = match x_kind {
        // Room for full-width bars at the first and last label position.
        XAxisKind::Category => (x_min - 0.5, x_max + 0.5),
        _ => padded(x_min, x_max),
    };
    // Bars grow from zero.
    let (y_min, y_max) = if spec.kind == ChartKind::Bar {
        padded(y_min.min(0.0), y_max.max(0.0))
    } else {
        padded(y_min, y_max)
    };

    let mut chart = ChartBuilder::on(root)
        .caption(opts.title.as_str(), ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(opts.x_label.as_str())
        .y_desc(opts.y_label.as_str())
        .x_label_formatter(&|v| format_x_value(x_kind, x_labels, *v))
        .draw()?;

    // Point radius range when a size column is bound.
    let size_bounds = series
        .iter()
        .filter_map(|s| s.sizes.as_ref())
        .flat_map(|sz| sz.iter().copied())
        .fold(None::<(f64, f64)>, |acc, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        });
    let radius_of = move |size: f64| -> i32 {
        match size_bounds {
            Some((lo, hi)) if hi > lo => (3.0 + (size - lo) / (hi - lo) * 9.0) as i32,
            _ => 3,
        }
    };

    for (idx, s) in series.iter().enumerate() {
        if s.points.is_empty() {
            continue;
        }
        let color = palette(idx);
        match spec.kind {
            ChartKind::Line => {
                let drawn =
                    chart.draw_series(LineSeries::new(s.points.iter().copied(), color))?;
                if !s.name.is_empty() {
                    drawn.label(s.name.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color)
                    });
                }
            }
            ChartKind::Scatter => {
                let sizes = s.sizes.clone();
                let drawn = chart.draw_series(s.points.iter().enumerate().map(|(i, &pt)| {
                    let r = match &sizes {
                        Some(sz) => radius_of(sz[i]),
                        None => 3,
                    };
                    Circle::new(pt, r, color.filled())
                }))?;
                if !s.name.is_empty() {
                    drawn
                        .label(s.name.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
                }
            }
            ChartKind::Bar => {
                let half = 0.3;
                let drawn = chart.draw_series(s.points.iter().map(|&(x, y)| {
                    Rectangle::new([(x - half, 0.0), (x + half, y)], color.filled())
                }))?;
                if !s.name.is_empty() {
                    drawn.label(s.name.as_str()).legend(move |(x, y)| {
                        Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled())
                    });
                }
            }
            ChartKind::Box | ChartKind::Histogram | ChartKind::Pie | ChartKind::Heatmap => {
                return Err(eyre!(
                    "{} charts do not render from xy series",
                    spec.kind.as_str()
                ));
            }
        }
    }

    if series.iter().any(|s| !s.name.is_empty()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_histogram(
    root: &Root,
    start: f64,
    bin_width: f64,
    groups: &[crate::chart_data::HistogramGroup],
    opts: &ExportOptions,
) -> Result<()> {
    let bins = groups.first().map(|g| g.counts.len()).unwrap_or(0);
    if bins == 0 {
        return Err(eyre!("no data to export"));
    }
    let max_count = groups
        .iter()
        .flat_map(|g| g.counts.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);

    let x_max = start + bin_width * bins as f64;
    let mut chart = ChartBuilder::on(root)
        .caption(opts.title.as_str(), ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(start..x_max, 0.0..(max_count as f64 * 1.05))?;

    chart
        .configure_mesh()
        .x_desc(opts.x_label.as_str())
        .y_desc("count")
        .draw()?;

    // Groups overlap; translucent fills keep them all visible.
    let alpha = if groups.len() > 1 { 0.5 } else { 1.0 };
    for (idx, grp) in groups.iter().enumerate() {
        let color = palette(idx);
        let drawn = chart.draw_series(grp.counts.iter().enumerate().map(|(b, &count)| {
            let x0 = start + bin_width * b as f64;
            let x1 = x0 + bin_width;
            Rectangle::new([(x0, 0.0), (x1, count as f64)], color.mix(alpha).filled())
        }))?;
        if !grp.name.is_empty() {
            drawn.label(grp.name.as_str()).legend(move |(x, y)| {
                Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled())
            });
        }
    }

    if groups.iter().any(|g| !g.name.is_empty()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_box(root: &Root, groups: &[BoxGroup], opts: &ExportOptions) -> Result<()> {
    if groups.is_empty() {
        return Err(eyre!("no data to export"));
    }

    let y_min = groups.iter().map(|g| g.min).fold(f64::INFINITY, f64::min);
    let y_max = groups
        .iter()
        .map(|g| g.max)
        .fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = padded(y_min, y_max);
    let labels: Vec<String> = groups.iter().map(|g| g.label.clone()).collect();

    let mut chart = ChartBuilder::on(root)
        .caption(opts.title.as_str(), ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..(groups.len() as f64 - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(opts.x_label.as_str())
        .y_desc(opts.y_label.as_str())
        .x_label_formatter(&|v| format_x_value(XAxisKind::Category, Some(&labels), *v))
        .draw()?;

    for (i, g) in groups.iter().enumerate() {
        let x = i as f64;
        let color = palette(i);
        let half = 0.25;
        // Box from q1 to q3 with a median line, whiskers to min and max.
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, g.q1), (x + half, g.q3)],
            color.mix(0.4).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, g.q1), (x + half, g.q3)],
            color.stroke_width(1),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x - half, g.median), (x + half, g.median)],
            color.stroke_width(2),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, g.q3), (x, g.max)],
            color.stroke_width(1),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, g.min), (x, g.q1)],
            color.stroke_width(1),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x - half / 2.0, g.max), (x + half / 2.0, g.max)],
            color.stroke_width(1),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x - half / 2.0, g.min), (x + half / 2.0, g.min)],
            color.stroke_width(1),
        )))?;
    }
    Ok(())
}

fn draw_pie(root: &Root, slices: &[(String, f64)], opts: &ExportOptions) -> Result<()> {
    let total: f64 = slices.iter().map(|(_, v)| v.max(0.0)).sum();
    if slices.is_empty() || total <= 0.0 {
        return Err(eyre!("no data to export"));
    }

    let root = root.titled(opts.title.as_str(), ("sans-serif", 20))?;
    let (w, h) = root.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = (w.min(h) as f64 / 2.0) * 0.7;

    let sizes: Vec<f64> = slices.iter().map(|(_, v)| v.max(0.0)).collect();
    let colors: Vec<RGBColor> = (0..slices.len()).map(palette).collect();
    let labels: Vec<String> = slices
        .iter()
        .map(|(label, v)| format!("{} ({:.1}%)", label, v.max(0.0) / total * 100.0))
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 14).into_font());
    root.draw(&pie)?;
    Ok(())
}

/// Zero-centered correlation color: blue for negative, red for positive, gray
/// for NaN.
fn correlation_color(r: f64) -> RGBColor {
    if r.is_nan() {
        return RGBColor(180, 180, 180);
    }
    let t = r.clamp(-1.0, 1.0);
    let fade = |c: u8| -> u8 { 255 - ((255 - c as i32) as f64 * t.abs()) as u8 };
    if t >= 0.0 {
        RGBColor(255, fade(40), fade(40))
    } else {
        RGBColor(fade(40), fade(40), 255)
    }
}

fn draw_heatmap(
    root: &Root,
    columns: &[String],
    matrix: &[Vec<f64>],
    opts: &ExportOptions,
) -> Result<()> {
    let n = columns.len();
    if n == 0 {
        return Err(eyre!("no data to export"));
    }

    let mut chart = ChartBuilder::on(root)
        .caption(opts.title.as_str(), ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)?;

    let col_label = |v: f64| -> String {
        // Cell centers sit at half-integer positions.
        let idx = (v - 0.5).round() as usize;
        if (v - (idx as f64 + 0.5)).abs() < 1e-9 {
            columns.get(idx).cloned().unwrap_or_default()
        } else {
            String::new()
        }
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n * 2 + 1)
        .y_labels(n * 2 + 1)
        .x_label_formatter(&|v| col_label(*v))
        .y_label_formatter(&|v| col_label(*v))
        .draw()?;

    for (i, row) in matrix.iter().enumerate() {
        for (j, &r) in row.iter().enumerate() {
            let x = j as f64;
            // Row 0 at the top.
            let y = (n - 1 - i) as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x, y), (x + 1.0, y + 1.0)],
                correlation_color(r).filled(),
            )))?;
            let text = if r.is_nan() {
                "-".to_string()
            } else {
                format!("{:.2}", r)
            };
            chart.draw_series(std::iter::once(Text::new(
                text,
                (x + 0.5, y + 0.5),
                ("sans-serif", 14)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            )))?;
        }
    }
    Ok(())
}
