//! Load delimited text into a typed DataFrame, and generate the built-in sample dataset.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tracing::debug;

/// Seed for the sample dataset generator. Fixed so repeated loads are identical.
pub const SAMPLE_SEED: u64 = 42;

/// Number of daily rows in the sample dataset (one year).
pub const SAMPLE_DAYS: usize = 365;

/// First date of the sample dataset. Anchored so the output never depends on the clock.
const SAMPLE_ANCHOR: (i32, u32, u32) = (2024, 1, 1);

const SAMPLE_REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const SAMPLE_CATEGORIES: [&str; 4] = ["Electronics", "Clothing", "Food", "Books"];

/// Options for reading delimited text.
#[derive(Clone, Copy, Debug)]
pub struct ReadOptions {
    pub has_header: bool,
    pub delimiter: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
        }
    }
}

/// Reads a delimited text file from disk into a DataFrame with inferred column types.
pub fn load_path(path: &Path, opts: ReadOptions) -> Result<DataFrame> {
    let pl_path = PlPath::Local(Arc::from(path));
    let lf = LazyCsvReader::new(pl_path)
        .with_has_header(opts.has_header)
        .with_separator(opts.delimiter)
        .finish()
        .map_err(|e| eyre!("cannot read {}: {}", path.display(), e))?;
    let df = lf
        .collect()
        .map_err(|e| eyre!("cannot parse {}: {}", path.display(), e))?;
    debug!(
        rows = df.height(),
        cols = df.width(),
        "loaded {}",
        path.display()
    );
    Ok(df)
}

/// Parses an in-memory byte stream of delimited text into a DataFrame.
/// Fails when the bytes are not valid delimited tabular text.
pub fn load_bytes(bytes: &[u8], opts: ReadOptions) -> Result<DataFrame> {
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = opts.has_header;
    read_options = read_options.map_parse_options(|parse| parse.with_separator(opts.delimiter));
    let df = read_options
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| eyre!("cannot parse input: {}", e))?;
    debug!(rows = df.height(), cols = df.width(), "parsed byte stream");
    Ok(df)
}

/// Generates one year of daily synthetic sales records with a fixed seed.
/// Columns: Date, Sales, Profit, Region, Category, Units_Sold.
/// Deterministic: two invocations produce identical values.
pub fn load_sample() -> Result<DataFrame> {
    let mut rng = Xoshiro256Plus::seed_from_u64(SAMPLE_SEED);

    let anchor = NaiveDate::from_ymd_opt(SAMPLE_ANCHOR.0, SAMPLE_ANCHOR.1, SAMPLE_ANCHOR.2)
        .ok_or_else(|| eyre!("invalid sample anchor date"))?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| eyre!("invalid epoch"))?;
    let anchor_days = (anchor - epoch).num_days() as i32;

    let mut days = Vec::with_capacity(SAMPLE_DAYS);
    let mut sales = Vec::with_capacity(SAMPLE_DAYS);
    let mut profit = Vec::with_capacity(SAMPLE_DAYS);
    let mut regions = Vec::with_capacity(SAMPLE_DAYS);
    let mut categories = Vec::with_capacity(SAMPLE_DAYS);
    let mut units = Vec::with_capacity(SAMPLE_DAYS);

    for i in 0..SAMPLE_DAYS {
        days.push(anchor_days + i as i32);
        sales.push(rng.gen_range(1000..5000) as i64);
        profit.push(rng.gen_range(100..1000) as i64);
        regions.push(SAMPLE_REGIONS[rng.gen_range(0..SAMPLE_REGIONS.len())]);
        categories.push(SAMPLE_CATEGORIES[rng.gen_range(0..SAMPLE_CATEGORIES.len())]);
        units.push(rng.gen_range(10..200) as i64);
    }

    let date = Series::new("Date".into(), days)
        .cast(&DataType::Date)?
        .into_column();

    let df = DataFrame::new(vec![
        date,
        Column::new("Sales".into(), sales),
        Column::new("Profit".into(), profit),
        Column::new("Region".into(), regions),
        Column::new("Category".into(), categories),
        Column::new("Units_Sold".into(), units),
    ])?;
    Ok(df)
}
