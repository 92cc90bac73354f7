// src/utils/progress_bars/logging.rs - Logging helpers for table scoring
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::scoring::TableScoringStats;

/// Per-table logger; every line is tagged with the table name.
#[derive(Clone)]
pub struct ScoringLogger {
    table_name: String,
    start_time: Instant,
}

impl ScoringLogger {
    pub fn new(input: &Path) -> Self {
        let table_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());
        Self {
            table_name,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self) {
        info!("[{}] 📄 🚀 Scoring table", self.table_name);
    }

    pub fn log_loaded(&self, rows: usize, columns: usize) {
        info!(
            "[{}] 📄 📊 Loaded {} candidate pairs ({} columns) [+{:.1}s]",
            self.table_name,
            rows,
            columns,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_scored(&self, stats: &TableScoringStats) {
        info!(
            "[{}] 📄 ✅ Scored {} pairs: {} forced to sentinel (group C), {} self-pairs zeroed [+{:.1}s]",
            self.table_name,
            stats.rows,
            stats.downweighted_overrides,
            stats.self_pair_overrides,
            self.start_time.elapsed().as_secs_f32()
        );
        self.log_data_quality_issue("missing grantor/grantee values", stats.missing_text_fields);
        self.log_data_quality_issue("non-finite distances", stats.non_finite_distances);
    }

    pub fn log_written(&self, output: &Path) {
        info!(
            "[{}] 📄 💾 Wrote {} in {:.2?}",
            self.table_name,
            output.display(),
            self.start_time.elapsed()
        );
    }

    pub fn log_dry_run(&self, output: &Path) {
        info!(
            "[{}] 📄 ⏭️  Dry run, not writing {}",
            self.table_name,
            output.display()
        );
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] 📄 ⚠️  Data quality: {} instances of {}",
                self.table_name, count, issue_type
            );
        }
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] 📄 ❌ {}", self.table_name, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] 📄 {}", self.table_name, message);
    }

    pub fn get_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

pub fn log_batch_start(run_id: &str, table_count: usize, concurrency_limit: usize, sentinel: f64) {
    info!("🚀 ===== LEASE STRING DISSIMILARITY BATCH STARTING =====");
    info!("📅 Run ID: {}", run_id);
    info!("   • {} tables queued", table_count);
    info!("   • Concurrency limit: {} tables", concurrency_limit);
    info!("   • Sentinel distance: {}", sentinel);
    info!("=======================================================");
}

pub fn log_batch_complete(
    succeeded: usize,
    failed: usize,
    totals: &TableScoringStats,
    duration: Duration,
) {
    info!("🎉 ===== BATCH COMPLETE in {:.2?} =====", duration);
    info!("   • Tables scored: {}", succeeded);
    if failed > 0 {
        warn!("   • Tables failed: {}", failed);
    }
    info!("   • Pairs scored: {}", totals.rows);
    info!("   • Forced to sentinel (group C): {}", totals.downweighted_overrides);
    info!("   • Self-pairs zeroed: {}", totals.self_pair_overrides);
    if totals.non_finite_distances > 0 {
        warn!("   • Non-finite distances: {}", totals.non_finite_distances);
    }
}
