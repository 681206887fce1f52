//! CLI entry point: load a CSV file and iterate it as training batches.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_batching::{
    Batch, BatchConfig, ConverterRegistry, DataTable, FrameOptions, IteratorState, Target,
    TableBatchIterator, TargetSpec,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How the `--target` columns are encoded.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTargetMode {
    /// One nominal column, one-hot encoded
    Categorical,
    /// One or more numeric columns, used as-is
    Numeric,
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Iterate a CSV file as numeric training batches",
    long_about = "Loads a CSV file, resolves feature and target columns, and walks the \
                  table batch by batch the way a training loop would.\n\n\
                  EXAMPLES:\n  \
                  # Classification batches over every numeric column\n  \
                  lex-batching -i iris.csv --target species\n\n  \
                  # Regression with explicit features, print the first batch\n  \
                  lex-batching -i houses.csv -f rooms,area --target price --mode numeric --preview 1\n\n  \
                  # Pretraining batches, skipping incomplete rows\n  \
                  lex-batching -i data.csv --skip-missing --json"
)]
struct Args {
    /// Path to the CSV file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Feature columns (comma separated)
    ///
    /// If not specified, every numeric column that is not a target or the key column
    #[arg(short, long, value_delimiter = ',')]
    features: Vec<String>,

    /// Target column(s) (comma separated). Omit for features-only batches.
    #[arg(short, long, value_delimiter = ',')]
    target: Vec<String>,

    /// How target columns are encoded
    #[arg(long, value_enum, default_value = "categorical")]
    mode: CliTargetMode,

    /// Rows per batch
    #[arg(short, long, default_value = "32")]
    batch_size: usize,

    /// Skip rows with a missing feature or target value instead of failing
    #[arg(long)]
    skip_missing: bool,

    /// Column holding row identifiers (default: Row0, Row1, ...)
    #[arg(short, long)]
    key_column: Option<String>,

    /// Print the matrices of the first N batches
    #[arg(long, default_value = "0")]
    preview: usize,

    /// Number of passes over the table (resets the iterator between passes)
    #[arg(long, default_value = "1")]
    epochs: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output a JSON report to stdout instead of a human-readable summary
    ///
    /// Disables all logs so stdout only contains the report.
    #[arg(long)]
    json: bool,
}

/// Summary of one run, printed with `--json`.
#[derive(Debug, Serialize)]
struct IterationReport {
    input: String,
    total_rows: usize,
    used_rows: usize,
    skipped_rows: usize,
    batch_size: usize,
    epochs: usize,
    batches_per_epoch: usize,
    batch_sizes: Vec<usize>,
    feature_columns: Vec<String>,
    feature_width: Option<usize>,
    target: String,
    label_width: Option<usize>,
    vocabulary: Option<Vec<String>>,
    final_state: IteratorState,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }
    if args.epochs == 0 {
        return Err(anyhow!("--epochs must be at least 1"));
    }

    info!("Loading dataset from: {}", args.input.display());
    let df = load_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", df.shape());

    let mut options = FrameOptions::new();
    if let Some(ref key) = args.key_column {
        options = options.key_column(key);
    }
    let table = DataTable::from_dataframe(&df, &options)?;

    let target = target_spec(&args)?;
    let features = if args.features.is_empty() {
        numeric_columns(&table, &target)
    } else {
        args.features.clone()
    };
    if features.is_empty() {
        return Err(anyhow!(
            "No numeric feature columns found; pass them with --features"
        ));
    }

    let config = BatchConfig::builder()
        .feature_columns(features)
        .target(target)
        .batch_size(args.batch_size)
        .skip_missing(args.skip_missing)
        .build()?;

    let report = run(&args, &table, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn target_spec(args: &Args) -> Result<TargetSpec> {
    match (args.target.as_slice(), args.mode) {
        ([], _) => Ok(TargetSpec::None),
        ([column], CliTargetMode::Categorical) => Ok(TargetSpec::categorical(column)),
        (_, CliTargetMode::Categorical) => Err(anyhow!(
            "Categorical mode takes exactly one target column, got {}",
            args.target.len()
        )),
        (columns, CliTargetMode::Numeric) => Ok(TargetSpec::numeric(columns.iter().cloned())),
    }
}

/// Every column with a numeric converter that the target does not use.
fn numeric_columns(table: &DataTable, target: &TargetSpec) -> Vec<String> {
    let targets = target.columns();
    let registry = ConverterRegistry::global();
    table
        .schema()
        .columns()
        .iter()
        .filter(|spec| !targets.contains(&spec.name.as_str()))
        .filter(|spec| registry.converter_for(&spec.cell_type, Target::Number).is_some())
        .map(|spec| spec.name.clone())
        .collect()
}

fn run(args: &Args, table: &DataTable, config: &BatchConfig) -> Result<IterationReport> {
    let mut batches = TableBatchIterator::new(table, config)?;

    let mut batch_sizes = Vec::new();
    for epoch in 0..args.epochs {
        if epoch > 0 {
            batches.reset();
        }
        let mut sizes = Vec::new();
        while batches.has_next() {
            let batch = batches.next_batch()?;
            if epoch == 0 && sizes.len() < args.preview && !args.json {
                print_batch(sizes.len(), &batch);
            }
            sizes.push(batch.num_examples());
        }
        debug!(epoch, batches = sizes.len(), "finished pass");
        if epoch == 0 {
            batch_sizes = sizes;
        }
    }

    let used_rows: usize = batch_sizes.iter().sum();
    Ok(IterationReport {
        input: args.input.display().to_string(),
        total_rows: batches.total_rows(),
        used_rows,
        skipped_rows: batches.total_rows() - used_rows,
        batch_size: batches.batch_size(),
        epochs: args.epochs,
        batches_per_epoch: batch_sizes.len(),
        batch_sizes,
        feature_columns: config.feature_columns.clone(),
        feature_width: batches.feature_width(),
        target: config.target.as_str().to_string(),
        label_width: batches.label_width(),
        vocabulary: batches.vocabulary().map(|v| v.values().to_vec()),
        final_state: batches.state(),
    })
}

/// Note: uses `println!` intentionally for user-facing CLI output.
fn print_batch(index: usize, batch: &Batch) {
    println!("\nBATCH {index} ({} examples)", batch.num_examples());
    println!("{}", "-".repeat(40));
    let keys: Vec<&str> = batch.row_keys.iter().map(|k| k.as_str()).collect();
    println!("  Rows: {}", keys.join(", "));
    println!("  Features:\n{:.4}", batch.features);
    if let Some(ref labels) = batch.labels {
        println!("  Labels:\n{:.4}", labels);
    }
}

fn print_summary(report: &IterationReport) {
    println!("\n{}", "=".repeat(60));
    println!("BATCH ITERATION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  File: {}", report.input);
    println!(
        "  Rows: {} total, {} used, {} skipped",
        report.total_rows, report.used_rows, report.skipped_rows
    );
    println!("  Features: {}", report.feature_columns.join(", "));
    if let Some(width) = report.feature_width {
        println!("  Feature width: {width}");
    }
    println!("  Target: {}", report.target);
    if let Some(width) = report.label_width {
        println!("  Label width: {width}");
    }
    if let Some(ref vocabulary) = report.vocabulary {
        println!("  Vocabulary: {}", vocabulary.join(", "));
    }
    println!(
        "  Batches per epoch: {} (batch size {})",
        report.batches_per_epoch, report.batch_size
    );
    println!("  Epochs: {}", report.epochs);
    println!("{}", "=".repeat(60));
}

fn load_csv(path: &Path) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .map_err(|e| e.into())
}
