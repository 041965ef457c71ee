// Command-line front end.
//
// Each invocation runs one report against the configured dataset and either
// prints the payload to stdout or writes it to `--output`, followed by a
// markdown preview. Logs go to stderr so stdout stays machine-readable.
use clap::{Parser, Subcommand, ValueEnum};
use complaint_report::output::{self, Payload, Record, Records};
use complaint_report::types::{Aggregation, ComplaintCharts, DatasetInfo};
use complaint_report::util::format_int;
use complaint_report::{ReportConfig, ReportError};
use serde_json::{json, Value as JsonValue};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::Tabled;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "complaint-report")]
#[command(about = "Missing-value, frequency and pivot reports over complaint datasets")]
struct Cli {
    /// CSV or spreadsheet to report on
    #[arg(long, env = "COMPLAINT_REPORT_DATASET")]
    dataset: PathBuf,

    /// JSON synonym table: {"COLUMN": {"Canonical": ["variant", ...]}}
    #[arg(long)]
    synonyms: Option<PathBuf>,

    /// Normalize DEPT and CLOSED/OPEN with the built-in synonym table
    #[arg(long)]
    normalize: bool,

    /// Drop frequency entries seen fewer than N times
    #[arg(long, default_value_t = 0)]
    min_count: usize,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Rows shown in the console preview when writing to a file (0 = none)
    #[arg(long, default_value_t = 5)]
    preview: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Command {
    /// Missing-value counts, severities and recommendations
    Missing,
    /// Occurrences of each value of a column
    Frequency { column: String },
    /// Counts (or sums) of VALUE by ROWS across COLS
    Pivot {
        #[arg(long)]
        rows: String,
        #[arg(long, required = true, num_args = 1..)]
        cols: Vec<String>,
        #[arg(long)]
        value: String,
        /// Sum numeric values instead of counting them
        #[arg(long)]
        sum: bool,
    },
    /// Count, mean, std, min, quartiles and max of numeric columns
    Describe {
        #[arg(long = "column")]
        columns: Vec<String>,
    },
    /// Row and column counts, types and memory estimate
    Info,
    /// Non-null and null counts per column
    Columns,
    /// Distinct values per column
    Unique,
    /// Rows per day of a date column
    Trend { column: String },
    /// Complaint type x department x status pivot
    Complaints,
    /// Department, year and status chart series
    ComplaintCharts,
    /// Year x status pivot
    StatusByYear,
}

/// A finished report in both of its output shapes.
struct Rendered {
    title: &'static str,
    payload: JsonValue,
    records: Vec<Record>,
    /// Typed preview; falls back to the generic record preview.
    table: Option<String>,
}

impl Rendered {
    fn new<R: Payload + Records + ?Sized>(title: &'static str, report: &R) -> Self {
        Self {
            title,
            payload: report.to_payload(),
            records: report.to_records(),
            table: None,
        }
    }

    fn with_table<T: Tabled + Clone>(mut self, rows: &[T], max_rows: usize) -> Self {
        self.table = Some(output::preview_table_rows(rows, max_rows));
        self
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config(cli: &Cli) -> ReportConfig {
    ReportConfig {
        dataset: cli.dataset.clone(),
        synonyms: cli.synonyms.clone(),
        normalize: cli.normalize,
        min_count: cli.min_count,
        columns: match &cli.command {
            Command::Describe { columns } => columns.clone(),
            _ => Vec::new(),
        },
    }
}

fn run(cli: &Cli) -> complaint_report::Result<Rendered> {
    let engine = config(cli).engine()?;
    info!(dataset = %engine.dataset_path().display(), "running report");
    let rendered = match &cli.command {
        Command::Missing => {
            let report = engine.missing_report()?;
            Rendered::new("Missing Values Report", &report)
                .with_table(&report.missing_values_summary, cli.preview)
        }
        Command::Frequency { column } => {
            Rendered::new("Frequency Report", &engine.frequency(column)?)
        }
        Command::Pivot {
            rows,
            cols,
            value,
            sum,
        } => {
            let aggregation = if *sum {
                Aggregation::Sum
            } else {
                Aggregation::Count
            };
            Rendered::new(
                "Pivot Report",
                &engine.pivot(rows, cols.as_slice(), value, aggregation)?,
            )
        }
        Command::Describe { .. } => {
            Rendered::new("Descriptive Statistics", &engine.describe()?[..])
        }
        Command::Info => info_rendered(engine.dataset_info()?),
        Command::Columns => {
            let details = engine.column_details()?;
            Rendered::new("Column Details", &details[..]).with_table(&details, cli.preview)
        }
        Command::Unique => {
            let uniques = engine.unique_counts()?;
            Rendered::new("Unique Value Counts", &uniques[..]).with_table(&uniques, cli.preview)
        }
        Command::Trend { column } => {
            Rendered::new("Daily Trend", &engine.date_trend(column)?[..])
        }
        Command::Complaints => Rendered::new(
            "Complaint Type by Department and Status",
            &engine.complaint_pivot()?,
        ),
        Command::ComplaintCharts => charts_rendered(engine.complaint_charts()?),
        Command::StatusByYear => Rendered::new("Status by Year", &engine.status_by_year()?),
    };
    Ok(rendered)
}

fn info_rendered(info: DatasetInfo) -> Rendered {
    let records = info
        .dtypes
        .iter()
        .map(|(column, kind)| {
            let mut rec = Record::new();
            rec.insert("column".to_string(), json!(column));
            rec.insert("dtype".to_string(), json!(kind));
            rec
        })
        .collect();
    Rendered {
        title: "Dataset Info",
        payload: json!(info),
        records,
        table: None,
    }
}

fn charts_rendered(charts: ComplaintCharts) -> Rendered {
    let mut records = Vec::new();
    for (chart, series) in [
        ("department_chart", &charts.department_chart),
        ("yearly_chart", &charts.yearly_chart),
        ("status_chart", &charts.status_chart),
    ] {
        for (label, value) in series.labels.iter().zip(&series.values) {
            let mut rec = Record::new();
            rec.insert("chart".to_string(), json!(chart));
            rec.insert("label".to_string(), json!(label));
            rec.insert("value".to_string(), json!(value));
            records.push(rec);
        }
    }
    Rendered {
        title: "Complaint Charts",
        payload: json!(charts),
        records,
        table: None,
    }
}

fn emit(cli: &Cli, rendered: &Rendered) -> Result<(), Box<dyn Error>> {
    let Some(path) = &cli.output else {
        match cli.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(&rendered.payload)?),
            Format::Csv => print!("{}", output::records_to_csv(&rendered.records)?),
        }
        return Ok(());
    };
    match cli.format {
        Format::Json => output::write_json(path, &rendered.payload)?,
        Format::Csv => output::write_csv(path, &rendered.records)?,
    }
    println!("{}\n", rendered.title);
    if cli.preview > 0 {
        match &rendered.table {
            Some(table) => println!("{}", table),
            None => println!("{}", output::preview_records(&rendered.records, cli.preview)),
        }
    }
    println!(
        "({} rows, full table exported to {})\n",
        format_int(rendered.records.len()),
        path.display()
    );
    Ok(())
}

fn exit_code(err: &ReportError) -> ExitCode {
    use complaint_report::ErrorKind::*;
    ExitCode::from(match err.kind() {
        DatasetNotFound => 2,
        Schema => 3,
        DatasetRead => 4,
        TransientNetwork => 5,
        Config => 6,
    })
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let rendered = match run(&cli) {
        Ok(r) => r,
        Err(e) => {
            error!(kind = ?e.kind(), status = e.status_code(), "{}", e);
            return exit_code(&e);
        }
    };
    if let Err(e) = emit(&cli, &rendered) {
        error!("write error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
