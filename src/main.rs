use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use plotdash::chart_spec::{self, ChartConfig, ChartKind, Selection};
use plotdash::{
    classify, prepare, statistics, write_chart_png, AppConfig, ExportOptions, ReadOptions, Session,
    APP_NAME,
};

#[derive(Parser, Debug)]
#[command(version, about = "plotdash")]
struct Args {
    /// CSV file to load ("-" reads from stdin); omit with --sample
    path: Option<PathBuf>,

    /// Load the built-in sample dataset instead of a file
    #[arg(long = "sample", action)]
    sample: bool,

    /// Chart kind: line, bar, scatter, box, histogram, pie, or heatmap
    #[arg(long = "chart")]
    chart: Option<ChartKind>,

    /// Column for the x-axis
    #[arg(long = "x")]
    x: Option<String>,

    /// Column for the y-axis
    #[arg(long = "y")]
    y: Option<String>,

    /// Categorical column to split series by color
    #[arg(long = "color")]
    color: Option<String>,

    /// Numeric column for scatter point sizes
    #[arg(long = "size")]
    size: Option<String>,

    /// Histogram bin count (clamped to 5..=100)
    #[arg(long = "bins")]
    bins: Option<u32>,

    /// Output image path
    #[arg(long = "output", default_value = "chart.png")]
    output: PathBuf,

    /// Chart title (composed from the bindings when omitted)
    #[arg(long = "title")]
    title: Option<String>,

    /// Specify the delimiter to use when reading a file
    #[arg(long = "delimiter")]
    delimiter: Option<u8>,

    /// Specify that the file has no header
    #[arg(long = "no-header", action)]
    no_header: bool,

    /// Print the summary statistics only; no chart
    #[arg(long = "stats-only", action)]
    stats_only: bool,

    /// Enable debug logging
    #[arg(long = "debug", action)]
    debug: bool,
}

impl From<&Args> for ReadOptions {
    fn from(args: &Args) -> Self {
        let mut opts = ReadOptions::default();
        if let Some(delimiter) = args.delimiter {
            opts.delimiter = delimiter;
        }
        opts.has_header = !args.no_header;
        opts
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", APP_NAME, default)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Heatmaps use every numeric column jointly, so explicit column bindings on
/// the command line would be silently ignored. Surface that instead.
fn heatmap_note(args: &Args) -> Option<&'static str> {
    let bound = args.x.is_some() || args.y.is_some() || args.color.is_some() || args.size.is_some();
    (args.chart == Some(ChartKind::Heatmap) && bound)
        .then_some("heatmap uses all numeric columns jointly; ignoring column bindings")
}

fn load(session: &mut Session, args: &Args) -> Result<()> {
    let opts: ReadOptions = args.into();
    if args.sample {
        session.load_sample()?;
    } else {
        match &args.path {
            Some(path) if path.as_os_str() == "-" => {
                let mut bytes = Vec::new();
                std::io::stdin().read_to_end(&mut bytes)?;
                session.load_bytes(&bytes, "stdin", opts)?;
            }
            Some(path) => {
                session.load_path(path, opts)?;
            }
            None => {
                return Err(color_eyre::eyre::eyre!(
                    "no input: give a CSV path or use --sample"
                ));
            }
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = AppConfig::load(APP_NAME).unwrap_or_default();

    let mut session = Session::new();
    load(&mut session, args)?;
    let table = session
        .table()
        .ok_or_else(|| color_eyre::eyre::eyre!("no table loaded"))?;
    println!("{}", table.overview());

    // Charts draw from a bounded slice of the table; statistics see all rows.
    let df = &table.df;
    let chart_df = df.head(Some(config.chart.row_limit));
    let roles = classify::classify(df);
    let all: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    if !args.stats_only {
        if let Some(note) = heatmap_note(args) {
            eprintln!("Note: {}", note);
        }
        let kind = args.chart.unwrap_or_default();
        let selection = Selection {
            x: args.x.clone(),
            y: args.y.clone(),
            color: args.color.clone(),
            size: args.size.clone(),
            bins: args.bins.or(Some(config.chart.default_bins)),
        };
        match chart_spec::configure(kind, &roles, &all, &selection) {
            ChartConfig::Ready(spec) => {
                let data = prepare(&chart_df, &roles, &spec)?;
                let opts = ExportOptions {
                    title: args.title.clone().unwrap_or_else(|| spec.title()),
                    x_label: spec.x.clone().unwrap_or_default(),
                    y_label: spec.y.clone().unwrap_or_default(),
                    width: config.export.width,
                    height: config.export.height,
                };
                write_chart_png(&args.output, &spec, &data, &opts)?;
                println!("Wrote {}", args.output.display());
            }
            ChartConfig::Invalid(warning) => {
                eprintln!("Warning: {}", warning);
            }
        }
    }

    let report = statistics::summarize(df)?;
    print!("{}", statistics::format_report(&report));
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    color_eyre::install()?;
    init_logging(args.debug);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            path: None,
            sample: true,
            chart: Some(ChartKind::Heatmap),
            x: Some("Sales".to_string()),
            y: None,
            color: None,
            size: None,
            bins: None,
            output: PathBuf::from("chart.png"),
            title: None,
            delimiter: None,
            no_header: false,
            stats_only: false,
            debug: false,
        }
    }

    #[test]
    fn heatmap_with_bindings_gets_a_note() {
        assert!(heatmap_note(&args()).is_some());
    }

    #[test]
    fn heatmap_without_bindings_stays_quiet() {
        let mut a = args();
        a.x = None;
        assert!(heatmap_note(&a).is_none());
    }

    #[test]
    fn other_kinds_get_no_note() {
        let mut a = args();
        a.chart = Some(ChartKind::Line);
        assert!(heatmap_note(&a).is_none());
        a.chart = None;
        assert!(heatmap_note(&a).is_none());
    }
}
