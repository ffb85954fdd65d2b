//! CLI entry point for the bike-sharing ETL.
//!
//! One subcommand per stage, so an external scheduler can trigger (and retry)
//! them individually, plus `run` to execute the whole chain at once.

use anyhow::{Context, Result};
use bikeshare_etl::config::{Codec, ObservationWindow, PipelineConfig, WeekdayConvention};
use bikeshare_etl::error::{PipelineError, Stage};
use bikeshare_etl::pipeline::Pipeline;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_etl")]
#[command(about = "Validate, enrich and aggregate hourly bike-sharing rentals", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Raw hourly CSV
    #[arg(long, global = true, env = "BIKESHARE_RAW_INPUT", default_value = "data/raw/hour.csv")]
    input: PathBuf,

    /// Directory receiving the parquet artifacts and the staging area
    #[arg(long, global = true, env = "BIKESHARE_OUTPUT_DIR", default_value = "data/processed")]
    output_dir: PathBuf,

    /// Logical run date (YYYY-MM-DD), defaults to today
    #[arg(long, global = true, env = "BIKESHARE_RUN_DATE")]
    run_date: Option<NaiveDate>,

    /// Day encoded as weekday 0: `sunday` or `monday`
    #[arg(long, global = true, env = "BIKESHARE_WEEKDAY_CONVENTION", default_value_t = WeekdayConvention::default())]
    weekday_convention: WeekdayConvention,

    /// First calendar year of the two-year observation window
    #[arg(long, global = true, env = "BIKESHARE_FIRST_YEAR", default_value_t = 2011)]
    first_year: i32,

    /// Parquet compression: snappy, gzip, lz4, zstd or none
    #[arg(long, global = true, env = "BIKESHARE_COMPRESSION", default_value_t = Codec::default())]
    compression: Codec,
}

impl ConfigArgs {
    fn into_config(self) -> PipelineConfig {
        let run_date = self.run_date.unwrap_or_else(|| Local::now().date_naive());
        PipelineConfig::new(self.input, self.output_dir, run_date)
            .with_window(ObservationWindow::new(self.first_year))
            .with_weekday_convention(self.weekday_convention)
            .with_compression(self.compression)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read the raw CSV and check schema, ranges and consistency
    Validate,
    /// Coerce types, drop duplicates and add physical units
    Normalize,
    /// Derive peak-hour, weekend and label columns
    Features,
    /// Build the daily and weekly rollups
    Aggregate,
    /// Write the three parquet artifacts
    Write,
    /// Run all five stages in sequence
    Run,
}

impl Commands {
    fn stage(&self) -> Option<Stage> {
        match self {
            Commands::Validate => Some(Stage::Validate),
            Commands::Normalize => Some(Stage::Normalize),
            Commands::Features => Some(Stage::EngineerFeatures),
            Commands::Aggregate => Some(Stage::Aggregate),
            Commands::Write => Some(Stage::Write),
            Commands::Run => None,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Keep the guard alive so buffered file logs are flushed on exit
    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let pipeline = Pipeline::new(cli.config.into_config());
    let config = pipeline.config();
    info!(
        input = %config.raw_input.display(),
        output_dir = %config.output_dir.display(),
        run_date = %config.run_date,
        weekday_convention = %config.weekday_convention,
        compression = %config.compression,
        "Configuration loaded"
    );

    match cli.command.stage() {
        Some(stage) => {
            let report = pipeline.run_stage(stage).map_err(log_failure)?;
            print_json(&report)?;
        }
        None => {
            let report = pipeline.run().map_err(log_failure)?;
            print_json(&report)?;
        }
    }

    Ok(())
}

/// Colored stderr plus a JSON rolling log file.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bikeshare_etl.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_etl.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(file_guard)
}

fn log_failure(e: PipelineError) -> anyhow::Error {
    error!(stage = %e.stage(), error = %e, "Stage failed");
    e.into()
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
