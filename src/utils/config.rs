// src/utils/config.rs - Explicit run configuration for the scoring batch
//
// Resolved once at process start (environment first, CLI flags on top) and
// handed to the batch driver. Nothing below the driver reads the environment.

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::scoring::{ScoringOptions, DEFAULT_MISSING_TOKEN};

pub const DEFAULT_INPUT_EXTENSION: &str = "csv";
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_stringmatched";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "csv";

/// What happens to the rest of the batch when one table fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop scheduling tables and return the error.
    #[default]
    Abort,
    /// Record the failure and keep going.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" | "continue" => Ok(FailurePolicy::Skip),
            other => Err(format!(
                "unknown failure policy '{}' (expected 'abort' or 'skip')",
                other
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SentinelSource {
    File(PathBuf),
    Value(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sentinel: SentinelSource,
    pub input_extension: String,
    pub output_suffix: String,
    pub output_extension: String,
    pub failure_policy: FailurePolicy,
    pub scoring: ScoringOptions,
    pub max_concurrent_tables: usize,
    pub summary_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, sentinel: SentinelSource) -> Self {
        Self {
            input_dir,
            output_dir,
            sentinel,
            input_extension: DEFAULT_INPUT_EXTENSION.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            failure_policy: FailurePolicy::default(),
            scoring: ScoringOptions::default(),
            max_concurrent_tables: num_cpus::get().max(1),
            summary_path: None,
            dry_run: false,
        }
    }

    /// Reads `LEASE_*` variables. Directories and a sentinel source are
    /// required; malformed optional values are errors rather than defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(None, None, None)
    }

    /// Like [`RunConfig::from_env`], but values passed in win over the
    /// environment and make the matching variables optional.
    pub fn from_env_with(
        input_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
        sentinel: Option<SentinelSource>,
    ) -> Result<Self> {
        let input_dir = match input_dir {
            Some(dir) => dir,
            None => PathBuf::from(env::var("LEASE_INPUT_DIR").context("LEASE_INPUT_DIR must be set")?),
        };
        let output_dir = match output_dir {
            Some(dir) => dir,
            None => {
                PathBuf::from(env::var("LEASE_OUTPUT_DIR").context("LEASE_OUTPUT_DIR must be set")?)
            }
        };
        let sentinel = match sentinel {
            Some(source) => source,
            None => sentinel_from_env()?,
        };

        let mut config = Self::new(input_dir, output_dir, sentinel);

        if let Some(v) = non_empty_var("LEASE_INPUT_EXTENSION") {
            config.input_extension = v;
        }
        if let Ok(v) = env::var("LEASE_OUTPUT_SUFFIX") {
            config.output_suffix = v;
        }
        if let Some(v) = non_empty_var("LEASE_OUTPUT_EXTENSION") {
            config.output_extension = v;
        }
        if let Some(v) = non_empty_var("LEASE_FAILURE_POLICY") {
            config.failure_policy = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = non_empty_var("LEASE_TEXT_PROCESSING") {
            config.scoring.text_processing = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = non_empty_var("LEASE_MISSING_TOKENS") {
            config.scoring.missing_tokens = parse_token_list(&v);
        }
        if let Some(v) = non_empty_var("LEASE_MAX_CONCURRENT_TABLES") {
            config.max_concurrent_tables = v
                .trim()
                .parse()
                .with_context(|| format!("LEASE_MAX_CONCURRENT_TABLES '{}' is not a count", v))?;
        }
        if let Some(v) = non_empty_var("LEASE_SUMMARY_PATH") {
            config.summary_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty_var("LEASE_DRY_RUN") {
            config.dry_run = v
                .trim()
                .parse()
                .with_context(|| format!("LEASE_DRY_RUN '{}' is not true/false", v))?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            bail!("Input directory {} does not exist", self.input_dir.display());
        }
        if self.max_concurrent_tables == 0 {
            bail!("max_concurrent_tables must be at least 1");
        }
        if self.input_extension.is_empty() || self.output_extension.is_empty() {
            bail!("Input and output extensions must not be empty");
        }
        if let SentinelSource::Value(v) = self.sentinel {
            crate::scoring::validate_sentinel(v)?;
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("⚙️  Run configuration:");
        info!("   • Input directory: {}", self.input_dir.display());
        info!("   • Output directory: {}", self.output_dir.display());
        match &self.sentinel {
            SentinelSource::File(path) => info!("   • Sentinel file: {}", path.display()),
            SentinelSource::Value(v) => info!("   • Sentinel value: {}", v),
        }
        info!(
            "   • Tables: *.{} → <name>{}.{}",
            self.input_extension, self.output_suffix, self.output_extension
        );
        info!("   • Text processing: {}", self.scoring.text_processing);
        info!("   • Missing-value tokens: {:?}", self.scoring.missing_tokens);
        info!("   • Failure policy: {}", self.failure_policy);
        info!("   • Concurrency limit: {} tables", self.max_concurrent_tables);
        if self.dry_run {
            info!("   • DRY RUN: no tables will be written");
        }
    }
}

fn sentinel_from_env() -> Result<SentinelSource> {
    match (
        non_empty_var("LEASE_SENTINEL_FILE"),
        non_empty_var("LEASE_SENTINEL_VALUE"),
    ) {
        (Some(_), Some(_)) => bail!("Set only one of LEASE_SENTINEL_FILE and LEASE_SENTINEL_VALUE"),
        (Some(file), None) => Ok(SentinelSource::File(PathBuf::from(file))),
        (None, Some(value)) => Ok(SentinelSource::Value(
            value
                .trim()
                .parse()
                .with_context(|| format!("LEASE_SENTINEL_VALUE '{}' is not a number", value))?,
        )),
        (None, None) => bail!("One of LEASE_SENTINEL_FILE or LEASE_SENTINEL_VALUE must be set"),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_token_list(raw: &str) -> Vec<String> {
    let tokens: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if tokens.is_empty() {
        vec![DEFAULT_MISSING_TOKEN.to_string()]
    } else {
        tokens
    }
}
