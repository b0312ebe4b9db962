//! Tally CLI binary.
//!
//! Provides command-line interface for per-segment sales forecasting and
//! markdown sensitivity analysis.

mod integration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::data_pipeline::{
    ConfigOverrides, KeySelection, load_panel_with_spinner, parse_key, resolve_config,
    select_keys,
};
use integration::render::{self, OutputFormat};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tally::data::{Panel, SegmentKey};
use tally::features::{autocorrelation, partial_autocorrelation, significant_lags};
use tally::output::{ExportFormat, Exporter};
use tally::{
    BatchConfig, ModelKind, PipelineConfig, SegmentOutcome, SegmentPipeline, batch_exports,
    batch_summary, run_batch_concurrent_with_progress,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally: per-segment retail sales forecasting and markdown sensitivity", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the features, sales and stores CSV files
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// JSON pipeline configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Weeks of sales history used as features
    #[arg(long, global = true)]
    lag_order: Option<usize>,

    /// Regressor: mean, linear or network
    #[arg(long, global = true)]
    model: Option<ModelKind>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how many weeks each segment covers
    Segments {
        /// List the segments with exactly this many weeks
        #[arg(long)]
        length: Option<usize>,

        /// Number of lengths shown in the distribution
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Autocorrelation diagnostics for choosing a lag order
    Lags {
        /// Store id
        #[arg(long)]
        store: u32,

        /// Department id
        #[arg(long)]
        dept: u32,

        /// Largest lag examined
        #[arg(long, default_value = "20")]
        max_lag: usize,
    },

    /// One-step sales forecast from lagged sales only
    Forecast {
        /// Store id
        #[arg(long)]
        store: u32,

        /// Department id
        #[arg(long)]
        dept: u32,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Sensitivity of weekly sales to markdowns and other regressors, one segment
    Sensitivity {
        /// Store id
        #[arg(long)]
        store: u32,

        /// Department id
        #[arg(long)]
        dept: u32,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Sensitivity analysis over many segments
    Batch {
        /// Explicit segments as STORE:DEPT, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_key)]
        keys: Vec<SegmentKey>,

        /// Use segments with this many weeks (default: the most common length)
        #[arg(long)]
        length: Option<usize>,

        /// Randomly pick this many segments
        #[arg(long)]
        sample: Option<usize>,

        /// Seed for --sample
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Segments processed in parallel
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Per-segment time budget in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = ConfigOverrides {
        lag_order: cli.lag_order,
        model: cli.model,
    };
    let config = resolve_config(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Segments { length, top } => {
            let panel = load_panel_with_spinner(&cli.data_dir)?;
            list_segments(&panel, length, top);
        }
        Commands::Lags {
            store,
            dept,
            max_lag,
        } => {
            let panel = load_panel_with_spinner(&cli.data_dir)?;
            lag_diagnostics(&panel, SegmentKey::new(store, dept), max_lag)?;
        }
        Commands::Forecast {
            store,
            dept,
            format,
            output,
        } => {
            let panel = load_panel_with_spinner(&cli.data_dir)?;
            forecast(&panel, config, SegmentKey::new(store, dept), format, output.as_deref())?;
        }
        Commands::Sensitivity {
            store,
            dept,
            format,
            output,
        } => {
            let panel = load_panel_with_spinner(&cli.data_dir)?;
            sensitivity(&panel, config, SegmentKey::new(store, dept), format, output.as_deref())?;
        }
        Commands::Batch {
            keys,
            length,
            sample,
            seed,
            concurrency,
            timeout_ms,
            format,
            output,
        } => {
            let panel = load_panel_with_spinner(&cli.data_dir)?;
            let selection = KeySelection {
                keys,
                length,
                sample,
                seed,
            };
            let batch = BatchConfig {
                concurrency,
                timeout_ms,
            };
            batch.validate()?;
            run_batch(panel, config, &selection, &batch, format, output.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print to stdout, or write to `path` when given.
fn emit(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn export_format(format: OutputFormat) -> Result<ExportFormat, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Csv => Ok(ExportFormat::Csv),
        OutputFormat::Json => Ok(ExportFormat::Json),
        OutputFormat::PrettyJson => Ok(ExportFormat::PrettyJson),
        OutputFormat::Text | OutputFormat::Markdown => {
            Err(format!("{format:?} is not a tabular export format").into())
        }
    }
}

fn list_segments(panel: &Panel, length: Option<usize>, top: usize) {
    match length {
        Some(length) => {
            print!("{}", render::segment_keys(length, &panel.keys_with_length(length)));
        }
        None => {
            print!("{}", render::segment_lengths(&panel.segment_lengths(), top));
            if let Some((length, count)) = panel.modal_length() {
                println!("\nMost common: {length} weeks ({count} segments)");
            }
        }
    }
}

fn lag_diagnostics(
    panel: &Panel,
    key: SegmentKey,
    max_lag: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let segment = panel
        .segment(key)
        .ok_or_else(|| format!("{key} is not in the panel"))?;
    let sales = segment.sales();
    let max_lag = max_lag.min(sales.len().saturating_sub(2)).max(1);

    let acf = autocorrelation(&sales, max_lag)?;
    let pacf = partial_autocorrelation(&sales, max_lag)?;
    let significant = significant_lags(&sales, max_lag)?;
    let band = 1.96 / (sales.len() as f64).sqrt();

    print!("{}", render::lag_diagnostics(key, &acf, &pacf, &significant, band));
    Ok(())
}

fn forecast(
    panel: &Panel,
    config: PipelineConfig,
    key: SegmentKey,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = SegmentPipeline::from_config(config)?;
    let report = pipeline
        .run_forecast(panel, key)
        .map_err(|reason| format!("{key}: {reason}"))?;

    let content = match format {
        OutputFormat::Text | OutputFormat::Markdown => render::forecast(&report),
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::PrettyJson => serde_json::to_string_pretty(&report)?,
        OutputFormat::Csv => report.to_exports().export_to_string(ExportFormat::Csv)?,
    };
    emit(&content, output)
}

fn sensitivity(
    panel: &Panel,
    config: PipelineConfig,
    key: SegmentKey,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = SegmentPipeline::from_config(config)?;
    let record = match pipeline.run_segment(panel, key) {
        SegmentOutcome::Completed(record) => record,
        SegmentOutcome::Skipped { key, reason } => {
            return Err(format!("{key} skipped: {reason}").into());
        }
    };

    let content = match format {
        OutputFormat::Text | OutputFormat::Markdown => render::sensitivity(&record),
        OutputFormat::Json => serde_json::to_string(&record)?,
        OutputFormat::PrettyJson => serde_json::to_string_pretty(&record)?,
        OutputFormat::Csv => SegmentOutcome::Completed(record)
            .to_exports()
            .export_to_string(ExportFormat::Csv)?,
    };
    emit(&content, output)
}

async fn run_batch(
    panel: Panel,
    config: PipelineConfig,
    selection: &KeySelection,
    batch: &BatchConfig,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = select_keys(&panel, selection)?;
    let pipeline = SegmentPipeline::from_config(config)?;

    let pb = ProgressBar::new(keys.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Analysing {} segments ({} concurrent)...",
        keys.len(),
        batch.concurrency
    ));

    let outcomes = if batch.concurrency > 1 || batch.timeout_ms.is_some() {
        run_batch_concurrent_with_progress(&pipeline, Arc::new(panel), &keys, batch, |_| {
            pb.inc(1);
        })
        .await
    } else {
        pipeline.run_batch_with_progress(&panel, &keys, |_| pb.inc(1))
    };

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    pb.finish_with_message(format!(
        "{completed} completed, {} skipped",
        outcomes.len() - completed
    ));

    let content = match format {
        OutputFormat::Text => {
            let mut text: String = outcomes.iter().map(|o| format!("{o}\n")).collect();
            text.push_str(&batch_summary(&outcomes).to_ascii_table());
            text
        }
        OutputFormat::Markdown => batch_summary(&outcomes).to_markdown(),
        other => batch_exports(&outcomes).export_to_string(export_format(other)?)?,
    };
    emit(&content, output)
}
