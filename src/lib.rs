use std::path::Path;

use color_eyre::Result;
use polars::prelude::DataFrame;
use tracing::info;

pub mod chart_data;
pub mod chart_export;
pub mod chart_spec;
pub mod classify;
pub mod config;
pub mod loader;
pub mod statistics;

pub use chart_data::{prepare, ChartData};
pub use chart_export::{write_chart_png, ExportOptions};
pub use chart_spec::{configure, ChartConfig, ChartKind, ChartSpec, Selection};
pub use classify::{classify, ColumnRoles};
pub use config::{AppConfig, ConfigManager};
pub use loader::ReadOptions;
pub use statistics::{format_report, summarize, SummaryReport};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "plotdash";

/// The currently loaded table together with the name of where it came from.
#[derive(Clone, Debug)]
pub struct LoadedTable {
    pub df: DataFrame,
    pub source: String,
}

impl LoadedTable {
    /// Overview line: rows, columns, numeric columns, source.
    pub fn overview(&self) -> String {
        let numeric = self
            .df
            .schema()
            .iter()
            .filter(|(_, dtype)| dtype.is_numeric())
            .count();
        format!(
            "{}: {} rows, {} columns ({} numeric)",
            self.source,
            self.df.height(),
            self.df.width(),
            numeric
        )
    }
}

/// Holds the current table. A successful load replaces it wholesale; a failed
/// load leaves the previous table untouched.
#[derive(Debug, Default)]
pub struct Session {
    table: Option<LoadedTable>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&LoadedTable> {
        self.table.as_ref()
    }

    pub fn load_path(&mut self, path: &Path, opts: ReadOptions) -> Result<&LoadedTable> {
        let df = loader::load_path(path, opts)?;
        Ok(self.replace(df, path.display().to_string()))
    }

    pub fn load_bytes(&mut self, bytes: &[u8], source: &str, opts: ReadOptions) -> Result<&LoadedTable> {
        let df = loader::load_bytes(bytes, opts)?;
        Ok(self.replace(df, source.to_string()))
    }

    pub fn load_sample(&mut self) -> Result<&LoadedTable> {
        let df = loader::load_sample()?;
        Ok(self.replace(df, "sample".to_string()))
    }

    fn replace(&mut self, df: DataFrame, source: String) -> &LoadedTable {
        info!(rows = df.height(), cols = df.width(), source = %source, "table loaded");
        self.table.insert(LoadedTable { df, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_load_keeps_previous_table() {
        let mut session = Session::new();
        session.load_sample().unwrap();
        let before = session.table().unwrap().df.clone();

        let err = session.load_bytes(b"a,b\n1,2\n3,4,5\n", "bad", ReadOptions::default());
        assert!(err.is_err());
        assert!(session.table().unwrap().df.equals(&before));
    }

    #[test]
    fn successful_load_replaces_table() {
        let mut session = Session::new();
        session.load_sample().unwrap();
        session
            .load_bytes(b"a,b\n1,2\n", "tiny", ReadOptions::default())
            .unwrap();
        let table = session.table().unwrap();
        assert_eq!(table.source, "tiny");
        assert_eq!(table.df.height(), 1);
    }

    #[test]
    fn overview_counts_numeric_columns() {
        let mut session = Session::new();
        session.load_sample().unwrap();
        let line = session.table().unwrap().overview();
        assert_eq!(line, "sample: 365 rows, 6 columns (3 numeric)");
    }
}
