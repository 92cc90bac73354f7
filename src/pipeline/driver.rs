// src/pipeline/driver.rs - Runs the scorer over every table in the input directory
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::discovery::{discover_tables, plan_outputs};
use super::sentinel::load_sentinel;
use crate::scoring::{score_table, validate_sentinel, ScoringOptions, TableScoringStats};
use crate::table::{read_table, write_table};
use crate::utils::config::{FailurePolicy, RunConfig, SentinelSource};
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::{log_batch_complete, log_batch_start, ScoringLogger};
use crate::utils::progress_bars::progress_config::{add_bar, ProgressConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Written,
    DryRun,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: TableStatus,
    pub stats: Option<TableScoringStats>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sentinel: f64,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    /// In input (file name) order.
    pub tables: Vec<TableOutcome>,
    pub totals: TableScoringStats,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| !matches!(t.status, TableStatus::Failed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.tables.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write run summary {}", path.display()))?;
        info!("📝 Run summary written to {}", path.display());
        Ok(())
    }
}

pub fn resolve_sentinel(source: &SentinelSource) -> Result<f64> {
    match source {
        SentinelSource::File(path) => load_sentinel(path),
        SentinelSource::Value(v) => {
            validate_sentinel(*v)?;
            Ok(*v)
        }
    }
}

/// Reads, scores and writes one table. The output file is only created once
/// every row has been scored.
pub fn process_table(
    input: &Path,
    output: &Path,
    sentinel: f64,
    options: &ScoringOptions,
    dry_run: bool,
) -> Result<TableScoringStats> {
    let logger = ScoringLogger::new(input);
    logger.log_start();

    let table = read_table(input)?;
    logger.log_loaded(table.len(), table.headers().len());

    let scored = match score_table(table, sentinel, options) {
        Ok(scored) => scored,
        Err(e) => {
            logger.log_error(&e.to_string());
            return Err(anyhow::Error::new(e).context(format!("Failed to score {}", input.display())));
        }
    };
    logger.log_scored(&scored.stats);

    if dry_run {
        logger.log_dry_run(output);
    } else {
        write_table(output, &scored.table)?;
        logger.log_written(output);
    }
    logger.log_debug(&format!("Finished in {:.2?}", logger.get_elapsed()));
    Ok(scored.stats)
}

pub async fn run_batch(config: &RunConfig, progress: &ProgressConfig) -> Result<BatchSummary> {
    let started_at = Utc::now();
    let batch_start = Instant::now();
    let run_id = Uuid::new_v4().to_string();

    config.validate()?;
    config.log_config();

    let sentinel = resolve_sentinel(&config.sentinel)?;

    let inputs = discover_tables(&config.input_dir, &config.input_extension)?;
    let plan = plan_outputs(
        &inputs,
        &config.output_dir,
        &config.output_suffix,
        &config.output_extension,
    )?;
    if plan.is_empty() {
        warn!(
            "No .{} tables found in {}",
            config.input_extension,
            config.input_dir.display()
        );
    }
    if !config.dry_run {
        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create output directory {}", config.output_dir.display())
        })?;
    }

    log_batch_start(&run_id, plan.len(), config.max_concurrent_tables, sentinel);

    let multi_progress = progress.create_multi_progress();
    let main_pb = add_bar(multi_progress.as_ref(), plan.len() as u64, "Scoring tables...");
    let detail_progress = if progress.should_show_detailed() {
        multi_progress.clone()
    } else {
        None
    };

    // Set on the first failure under `Abort`; tables that have not started yet
    // check it and return without touching the output directory.
    let aborted = Arc::new(AtomicBool::new(false));

    let mut results = stream::iter(plan.into_iter().enumerate())
        .map(|(idx, (input, output))| {
            let options = config.scoring.clone();
            let dry_run = config.dry_run;
            let detail_progress = detail_progress.clone();
            let aborted = Arc::clone(&aborted);
            async move {
                let task_input = input.clone();
                let task_output = output.clone();
                let table_start = Instant::now();
                let joined = tokio::task::spawn_blocking(move || -> Result<Option<TableScoringStats>> {
                    if aborted.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    let spinner = table_spinner(detail_progress.as_ref(), &task_input);
                    let result = process_table(&task_input, &task_output, sentinel, &options, dry_run);
                    if let Some(sp) = spinner {
                        sp.finish_and_clear();
                    }
                    result.map(Some)
                })
                .await;
                let result = joined
                    .map_err(|e| anyhow!("Scoring task for {} panicked: {}", input.display(), e))
                    .and_then(|r| r);
                (idx, input, output, result, table_start.elapsed().as_secs_f64())
            }
        })
        .buffer_unordered(config.max_concurrent_tables);

    let mut outcomes: Vec<(usize, TableOutcome)> = Vec::new();
    let mut abort_error: Option<anyhow::Error> = None;
    while let Some((idx, input, output, result, elapsed_secs)) = results.next().await {
        let outcome = match result {
            Ok(Some(stats)) => TableOutcome {
                input,
                output,
                status: if config.dry_run {
                    TableStatus::DryRun
                } else {
                    TableStatus::Written
                },
                stats: Some(stats),
                elapsed_secs,
            },
            Ok(None) => {
                info!("⏹️  Table {} not started, batch is aborting", input.display());
                continue;
            }
            Err(e) => match config.failure_policy {
                FailurePolicy::Abort => {
                    if abort_error.is_some() {
                        error!("❌ Table {} also failed: {:#}", input.display(), e);
                        continue;
                    }
                    error!("❌ Table {} failed, aborting batch: {:#}", input.display(), e);
                    aborted.store(true, Ordering::SeqCst);
                    if let Some(pb) = &main_pb {
                        pb.abandon_with_message("Batch aborted");
                    }
                    abort_error = Some(e.context(format!("Table {} failed", input.display())));
                    continue;
                }
                FailurePolicy::Skip => {
                    error!("❌ Table {} failed, continuing: {:#}", input.display(), e);
                    TableOutcome {
                        input,
                        output,
                        status: TableStatus::Failed {
                            error: format!("{:#}", e),
                        },
                        stats: None,
                        elapsed_secs,
                    }
                }
            },
        };

        if abort_error.is_none() {
            if let Some(pb) = &main_pb {
                pb.inc(1);
                let name = outcome
                    .input
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if progress.should_show_memory() {
                    let memory_mb = get_memory_usage().await;
                    pb.set_message(format!("{} done (Memory: {} MB)", name, memory_mb));
                } else {
                    pb.set_message(format!("{} done", name));
                }
            }
        }
        outcomes.push((idx, outcome));
    }
    drop(results);

    // Every in-flight table has finished by now, so nothing writes after we return.
    if let Some(e) = abort_error {
        warn!(
            "Batch aborted after {} tables completed",
            outcomes.len()
        );
        return Err(e);
    }

    outcomes.sort_by_key(|(idx, _)| *idx);
    let tables: Vec<TableOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    let mut totals = TableScoringStats::default();
    for stats in tables.iter().filter_map(|t| t.stats.as_ref()) {
        totals.merge(stats);
    }

    let summary = BatchSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        sentinel,
        failure_policy: config.failure_policy,
        dry_run: config.dry_run,
        tables,
        totals,
    };

    if let Some(pb) = &main_pb {
        pb.finish_with_message(format!(
            "{} tables scored, {} failed",
            summary.succeeded(),
            summary.failed()
        ));
    }
    log_batch_complete(
        summary.succeeded(),
        summary.failed(),
        &summary.totals,
        batch_start.elapsed(),
    );

    if let Some(path) = &config.summary_path {
        summary.write_json(path)?;
    }

    Ok(summary)
}

fn table_spinner(multi: Option<&MultiProgress>, input: &Path) -> Option<ProgressBar> {
    let mp = multi?;
    let sp = mp.add(ProgressBar::new_spinner());
    sp.set_message(format!("Scoring {}", input.display()));
    sp.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(sp)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "unique_id.x,unique_id.y,group_final.x,group_final.y,grantor.x,grantor.y,alsgrantee.x,alsgrantee.y,grantor_weight,grantee_weight,volpage_dist,recordno_dist,insttype_dist,royalty_dist,startdate_dist,cluster_exprdate_dist";

    fn write_input(dir: &Path, name: &str, rows: &[&str]) {
        let mut content = format!("{}\n", HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_process_table_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_input(dir.path(), "a.csv", &["1,2,A,B,Acme,Acme,X,Y,1,1,0,0,0,0,0,0"]);
        let output = dir.path().join("a_out.csv");

        let stats = process_table(
            &dir.path().join("a.csv"),
            &output,
            100.0,
            &ScoringOptions::default(),
            true,
        )
        .unwrap();
        assert_eq!(stats.rows, 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_process_table_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        write_input(dir.path(), "bad.csv", &["1,2,A,B,Acme,Acme,X,Y,one,1,0,0,0,0,0,0"]);
        let output = dir.path().join("bad_out.csv");

        let err = process_table(
            &dir.path().join("bad.csv"),
            &output,
            100.0,
            &ScoringOptions::default(),
            false,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("grantor_weight"));
        assert!(!output.exists());
    }

    #[test]
    fn test_resolve_sentinel_value() {
        assert_eq!(resolve_sentinel(&SentinelSource::Value(12.5)).unwrap(), 12.5);
        assert!(resolve_sentinel(&SentinelSource::Value(-1.0)).is_err());
    }

    #[tokio::test]
    async fn test_run_batch_skip_policy_records_failures() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_input(input.path(), "a.csv", &["1,2,A,B,Acme,Acme,X,Y,1,1,1,1,1,1,1,1"]);
        write_input(input.path(), "b.csv", &["1,2,A,B,Acme,Acme,X,Y,1,1,1,1,1,1,1,oops"]);
        write_input(input.path(), "c.csv", &["3,3,C,B,Acme,Acme,X,Y,1,1,1,1,1,1,1,1"]);

        let mut config = RunConfig::new(
            input.path().to_path_buf(),
            output.path().to_path_buf(),
            SentinelSource::Value(500.0),
        );
        config.failure_policy = FailurePolicy::Skip;
        config.max_concurrent_tables = 2;

        let summary = run_batch(&config, &ProgressConfig::disabled()).await.unwrap();
        assert_eq!(summary.tables.len(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(matches!(summary.tables[1].status, TableStatus::Failed { .. }));
        assert_eq!(summary.totals.rows, 2);
        assert_eq!(summary.totals.self_pair_overrides, 1);

        assert!(output.path().join("a_stringmatched.csv").exists());
        assert!(!output.path().join("b_stringmatched.csv").exists());
        assert!(output.path().join("c_stringmatched.csv").exists());
    }

    #[tokio::test]
    async fn test_run_batch_abort_policy_returns_error() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_input(input.path(), "only.csv", &["1,2,A,B,Acme,Acme,X,Y,1,1,1,1,1,1,1,oops"]);

        let mut config = RunConfig::new(
            input.path().to_path_buf(),
            output.path().to_path_buf(),
            SentinelSource::Value(500.0),
        );
        config.max_concurrent_tables = 1;

        let err = run_batch(&config, &ProgressConfig::disabled()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("only.csv"));
        assert!(!output.path().join("only_stringmatched.csv").exists());
    }

    fn output_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_abort_waits_for_tables_in_flight() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_input(input.path(), "a_bad.csv", &["1,2,A,B,Acme,Acme,X,Y,oops,1,0,0,0,0,0,0"]);
        let big_row = "1,2,A,B,Acme Oil and Gas Company of Texas,ACME OIL & GAS CO OF TEXAS,Smith John and Mary Smith,John Smith et ux,1,1,1,1,1,1,1,1";
        let big_rows: Vec<&str> = std::iter::repeat(big_row).take(4000).collect();
        write_input(input.path(), "b_big.csv", &big_rows);
        write_input(input.path(), "c_later.csv", &["1,2,A,B,Acme,Acme,X,Y,1,1,1,1,1,1,1,1"]);

        let mut config = RunConfig::new(
            input.path().to_path_buf(),
            output.path().to_path_buf(),
            SentinelSource::Value(500.0),
        );
        config.max_concurrent_tables = 2;

        let err = run_batch(&config, &ProgressConfig::disabled()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("a_bad.csv"));

        let at_return = output_listing(output.path());
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(output_listing(output.path()), at_return);
        assert!(at_return.iter().all(|name| !name.starts_with(".tmp")), "{:?}", at_return);
        // Queued behind the failure, so it never started.
        assert!(!output.path().join("c_later_stringmatched.csv").exists());
    }
}
