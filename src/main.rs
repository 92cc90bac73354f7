// src/main.rs - Scores every candidate-pair table in a directory
use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;

use lease_string_dissim::matching::fuzzy::TextProcessing;
use lease_string_dissim::pipeline::{run_batch, TableStatus};
use lease_string_dissim::utils::config::{FailurePolicy, RunConfig, SentinelSource};
use lease_string_dissim::utils::env::{load_env, load_env_from};
use lease_string_dissim::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the candidate-pair tables
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory the scored tables are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// CSV with a column `x` whose first value is the sentinel distance
    #[arg(long, conflicts_with = "sentinel_value")]
    sentinel_file: Option<PathBuf>,

    /// Sentinel distance given directly
    #[arg(long)]
    sentinel_value: Option<f64>,

    /// What to do when a table fails: abort or skip
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,

    /// Text normalization before fuzzy matching: full or raw
    #[arg(long)]
    text_processing: Option<TextProcessing>,

    #[arg(long)]
    max_concurrent_tables: Option<usize>,

    /// Write a JSON run summary here
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Score everything but write no tables
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    output_suffix: Option<String>,

    #[arg(long)]
    input_extension: Option<String>,

    #[arg(long)]
    output_extension: Option<String>,

    /// Cell value treated as missing; repeat for several
    #[arg(long = "missing-token")]
    missing_tokens: Vec<String>,

    /// Env file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

fn build_config(args: Args) -> Result<RunConfig> {
    let sentinel = match (args.sentinel_file, args.sentinel_value) {
        (Some(_), Some(_)) => bail!("Pass only one of --sentinel-file and --sentinel-value"),
        (Some(file), None) => Some(SentinelSource::File(file)),
        (None, Some(value)) => Some(SentinelSource::Value(value)),
        (None, None) => None,
    };

    let mut config = RunConfig::from_env_with(args.input_dir, args.output_dir, sentinel)?;

    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    if let Some(processing) = args.text_processing {
        config.scoring.text_processing = processing;
    }
    if let Some(n) = args.max_concurrent_tables {
        config.max_concurrent_tables = n;
    }
    if args.summary_path.is_some() {
        config.summary_path = args.summary_path;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(suffix) = args.output_suffix {
        config.output_suffix = suffix;
    }
    if let Some(ext) = args.input_extension {
        config.input_extension = ext;
    }
    if let Some(ext) = args.output_extension {
        config.output_extension = ext;
    }
    if !args.missing_tokens.is_empty() {
        config.scoring.missing_tokens = args.missing_tokens;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match &args.env_file {
        Some(path) => load_env_from(path)?,
        None => load_env(),
    }

    info!("🚀 Starting lease string dissimilarity scoring");

    let config = match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {:#}", e);
            process::exit(2);
        }
    };
    let progress = ProgressConfig::from_env();

    let summary = run_batch(&config, &progress).await?;

    info!(
        "🏁 Run {} finished: {} tables scored, {} failed",
        summary.run_id,
        summary.succeeded(),
        summary.failed()
    );
    if summary.has_failures() {
        for outcome in &summary.tables {
            if let TableStatus::Failed { error } = &outcome.status {
                warn!("   • {}: {}", outcome.input.display(), error);
            }
        }
        process::exit(1);
    }
    Ok(())
}
