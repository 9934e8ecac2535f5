//! Chart configuration: per-kind column domains and assembly of a chart spec.

use std::str::FromStr;

use crate::classify::ColumnRoles;

/// Chart kind. Dispatch is always an exhaustive match over this enum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Scatter,
    Box,
    Histogram,
    Pie,
    Heatmap,
}

impl ChartKind {
    pub const ALL: [Self; 7] = [
        Self::Line,
        Self::Bar,
        Self::Scatter,
        Self::Box,
        Self::Histogram,
        Self::Pie,
        Self::Heatmap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Bar => "Bar",
            Self::Scatter => "Scatter",
            Self::Box => "Box",
            Self::Histogram => "Histogram",
            Self::Pie => "Pie",
            Self::Heatmap => "Heatmap",
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "scatter" => Ok(Self::Scatter),
            "box" => Ok(Self::Box),
            "histogram" | "hist" => Ok(Self::Histogram),
            "pie" => Ok(Self::Pie),
            "heatmap" => Ok(Self::Heatmap),
            other => Err(format!(
                "unknown chart kind '{}' (expected one of: line, bar, scatter, box, histogram, pie, heatmap)",
                other
            )),
        }
    }
}

/// Histogram bin bounds and default.
pub const HISTOGRAM_MIN_BINS: u32 = 5;
pub const HISTOGRAM_MAX_BINS: u32 = 100;
pub const HISTOGRAM_DEFAULT_BINS: u32 = 30;

/// Minimum numeric columns for a correlation heatmap.
pub const HEATMAP_MIN_NUMERIC: usize = 2;

/// Raw user selections before validation. Any field may be unset.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub bins: Option<u32>,
}

/// A fully resolved chart render request, built fresh from the current
/// selections on every pass and discarded after rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub bins: Option<u32>,
}

impl ChartSpec {
    /// Default chart title composed from the bindings.
    pub fn title(&self) -> String {
        let x = self.x.as_deref().unwrap_or("");
        let y = self.y.as_deref().unwrap_or("");
        match self.kind {
            ChartKind::Line => format!("{} over {}", y, x),
            ChartKind::Bar | ChartKind::Pie => format!("{} by {}", y, x),
            ChartKind::Scatter => format!("{} vs {}", y, x),
            ChartKind::Box => format!("Distribution of {} by {}", y, x),
            ChartKind::Histogram => format!("Distribution of {}", x),
            ChartKind::Heatmap => "Correlation Heatmap".to_string(),
        }
    }
}

/// Outcome of configuring a chart: a spec ready to render, or a warning and no
/// spec when a hard precondition is unmet. Never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartConfig {
    Ready(ChartSpec),
    Invalid(String),
}

impl ChartConfig {
    pub fn spec(&self) -> Option<&ChartSpec> {
        match self {
            Self::Ready(spec) => Some(spec),
            Self::Invalid(_) => None,
        }
    }
}

/// Preferred set, falling back to every column when the set is empty so that no
/// column is ever permanently unselectable. The fallback may permit column/kind
/// pairs the renderer does not handle well; that is left to the renderer.
fn or_all(preferred: &[String], all: &[String]) -> Vec<String> {
    if preferred.is_empty() {
        all.to_vec()
    } else {
        preferred.to_vec()
    }
}

/// Valid x-axis choices for a chart kind.
pub fn x_domain(kind: ChartKind, roles: &ColumnRoles, all: &[String]) -> Vec<String> {
    match kind {
        ChartKind::Line => or_all(&roles.datetime, all),
        ChartKind::Bar => all.to_vec(),
        ChartKind::Scatter | ChartKind::Histogram => or_all(&roles.numeric, all),
        ChartKind::Box | ChartKind::Pie => or_all(&roles.categorical, all),
        ChartKind::Heatmap => Vec::new(),
    }
}

/// Valid y-axis choices for a chart kind; None when the kind has no y-axis.
pub fn y_domain(kind: ChartKind, roles: &ColumnRoles, all: &[String]) -> Option<Vec<String>> {
    match kind {
        ChartKind::Line | ChartKind::Bar | ChartKind::Scatter | ChartKind::Box | ChartKind::Pie => {
            Some(or_all(&roles.numeric, all))
        }
        ChartKind::Histogram | ChartKind::Heatmap => None,
    }
}

/// Valid color-grouping choices (categorical only; no fallback).
pub fn color_domain(roles: &ColumnRoles) -> Vec<String> {
    roles.categorical.clone()
}

/// Valid point-size choices for scatter (numeric only; no fallback).
pub fn size_domain(roles: &ColumnRoles) -> Vec<String> {
    roles.numeric.clone()
}

fn pick(
    label: &str,
    chosen: &Option<String>,
    domain: &[String],
) -> Result<Option<String>, String> {
    match chosen {
        Some(name) => {
            if domain.iter().any(|c| c == name) {
                Ok(Some(name.clone()))
            } else {
                Err(format!("column '{}' is not available for {}", name, label))
            }
        }
        // Selectors default to the first valid choice.
        None => Ok(domain.first().cloned()),
    }
}

fn pick_optional(label: &str, chosen: &Option<String>, domain: &[String]) -> Result<Option<String>, String> {
    match chosen {
        Some(name) if domain.iter().any(|c| c == name) => Ok(Some(name.clone())),
        Some(name) => Err(format!("column '{}' is not available for {}", name, label)),
        None => Ok(None),
    }
}

/// Assembles a chart spec from the current selections, offering only the column
/// choices valid for the chart kind and falling back to all columns when a
/// preferred set is empty. Unmet hard preconditions (Heatmap with fewer than 2
/// numeric columns) yield `Invalid` with a warning instead of a spec.
pub fn configure(
    kind: ChartKind,
    roles: &ColumnRoles,
    all: &[String],
    sel: &Selection,
) -> ChartConfig {
    if all.is_empty() {
        return ChartConfig::Invalid("the table has no columns to chart".to_string());
    }

    match kind {
        ChartKind::Heatmap => {
            if roles.numeric.len() < HEATMAP_MIN_NUMERIC {
                return ChartConfig::Invalid(
                    "Heatmap requires at least 2 numeric columns".to_string(),
                );
            }
            ChartConfig::Ready(ChartSpec {
                kind,
                x: None,
                y: None,
                color: None,
                size: None,
                bins: None,
            })
        }
        ChartKind::Line | ChartKind::Bar | ChartKind::Scatter | ChartKind::Box | ChartKind::Pie => {
            let x = match pick("the x-axis", &sel.x, &x_domain(kind, roles, all)) {
                Ok(x) => x,
                Err(msg) => return ChartConfig::Invalid(msg),
            };
            let y_dom = y_domain(kind, roles, all).unwrap_or_default();
            let y = match pick("the y-axis", &sel.y, &y_dom) {
                Ok(y) => y,
                Err(msg) => return ChartConfig::Invalid(msg),
            };
            let color = match pick_optional("color grouping", &sel.color, &color_domain(roles)) {
                Ok(c) => c,
                Err(msg) => return ChartConfig::Invalid(msg),
            };
            let size = if kind == ChartKind::Scatter {
                match pick_optional("point size", &sel.size, &size_domain(roles)) {
                    Ok(s) => s,
                    Err(msg) => return ChartConfig::Invalid(msg),
                }
            } else {
                None
            };
            ChartConfig::Ready(ChartSpec {
                kind,
                x,
                y,
                color,
                size,
                bins: None,
            })
        }
        ChartKind::Histogram => {
            let x = match pick("the column", &sel.x, &x_domain(kind, roles, all)) {
                Ok(x) => x,
                Err(msg) => return ChartConfig::Invalid(msg),
            };
            let color = match pick_optional("color grouping", &sel.color, &color_domain(roles)) {
                Ok(c) => c,
                Err(msg) => return ChartConfig::Invalid(msg),
            };
            let bins = sel
                .bins
                .unwrap_or(HISTOGRAM_DEFAULT_BINS)
                .clamp(HISTOGRAM_MIN_BINS, HISTOGRAM_MAX_BINS);
            ChartConfig::Ready(ChartSpec {
                kind,
                x,
                y: None,
                color,
                size: None,
                bins: Some(bins),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> ColumnRoles {
        ColumnRoles {
            numeric: vec!["sales".into(), "profit".into()],
            categorical: vec!["region".into()],
            datetime: vec!["date".into()],
        }
    }

    fn all() -> Vec<String> {
        vec![
            "date".into(),
            "sales".into(),
            "profit".into(),
            "region".into(),
        ]
    }

    #[test]
    fn line_prefers_datetime_x() {
        assert_eq!(x_domain(ChartKind::Line, &roles(), &all()), vec!["date"]);
    }

    #[test]
    fn line_falls_back_to_all_columns() {
        let mut r = roles();
        r.datetime.clear();
        assert_eq!(x_domain(ChartKind::Line, &r, &all()), all());
    }

    #[test]
    fn scatter_numeric_domains() {
        assert_eq!(
            x_domain(ChartKind::Scatter, &roles(), &all()),
            vec!["sales", "profit"]
        );
        assert_eq!(
            y_domain(ChartKind::Scatter, &roles(), &all()).unwrap(),
            vec!["sales", "profit"]
        );
    }

    #[test]
    fn every_column_selectable_somewhere() {
        // Union of fallback-inclusive domains covers every column.
        let r = roles();
        let all = all();
        for name in &all {
            let reachable = ChartKind::ALL.iter().any(|&k| {
                x_domain(k, &r, &all).contains(name)
                    || y_domain(k, &r, &all).is_some_and(|d| d.contains(name))
            });
            assert!(reachable, "column {} unreachable for every kind", name);
        }
    }

    #[test]
    fn defaults_to_first_domain_entry() {
        let cfg = configure(ChartKind::Line, &roles(), &all(), &Selection::default());
        let spec = cfg.spec().expect("ready");
        assert_eq!(spec.x.as_deref(), Some("date"));
        assert_eq!(spec.y.as_deref(), Some("sales"));
        assert_eq!(spec.color, None);
    }

    #[test]
    fn rejects_column_outside_domain() {
        let sel = Selection {
            x: Some("bogus".into()),
            ..Default::default()
        };
        let cfg = configure(ChartKind::Line, &roles(), &all(), &sel);
        assert!(matches!(cfg, ChartConfig::Invalid(_)));
    }

    #[test]
    fn histogram_bins_clamped() {
        let sel = Selection {
            bins: Some(200),
            ..Default::default()
        };
        let cfg = configure(ChartKind::Histogram, &roles(), &all(), &sel);
        assert_eq!(cfg.spec().unwrap().bins, Some(100));

        let sel = Selection {
            bins: Some(1),
            ..Default::default()
        };
        let cfg = configure(ChartKind::Histogram, &roles(), &all(), &sel);
        assert_eq!(cfg.spec().unwrap().bins, Some(5));

        let cfg = configure(ChartKind::Histogram, &roles(), &all(), &Selection::default());
        assert_eq!(cfg.spec().unwrap().bins, Some(HISTOGRAM_DEFAULT_BINS));
    }

    #[test]
    fn heatmap_needs_two_numeric_columns() {
        let mut r = roles();
        r.numeric = vec!["sales".into()];
        let cfg = configure(ChartKind::Heatmap, &r, &all(), &Selection::default());
        match cfg {
            ChartConfig::Invalid(ref msg) => assert!(msg.contains("at least 2 numeric")),
            ChartConfig::Ready(_) => panic!("expected Invalid"),
        }
        assert!(cfg.spec().is_none());
    }

    #[test]
    fn scatter_size_must_be_numeric() {
        let sel = Selection {
            size: Some("region".into()),
            ..Default::default()
        };
        let cfg = configure(ChartKind::Scatter, &roles(), &all(), &sel);
        assert!(matches!(cfg, ChartConfig::Invalid(_)));
    }

    #[test]
    fn titles_follow_bindings() {
        let cfg = configure(ChartKind::Line, &roles(), &all(), &Selection::default());
        assert_eq!(cfg.spec().unwrap().title(), "sales over date");
        let cfg = configure(ChartKind::Histogram, &roles(), &all(), &Selection::default());
        assert_eq!(cfg.spec().unwrap().title(), "Distribution of sales");
    }

    #[test]
    fn kind_parses_from_str() {
        assert_eq!("line".parse::<ChartKind>().unwrap(), ChartKind::Line);
        assert_eq!("HIST".parse::<ChartKind>().unwrap(), ChartKind::Histogram);
        assert!("donut".parse::<ChartKind>().is_err());
    }
}
