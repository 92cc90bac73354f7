// src/pipeline/sentinel.rs - Loads the "effectively infinite" distance for a run
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::errors::ScoringError;
use crate::scoring::validate_sentinel;
use crate::table::{read_table, read_table_from_reader, Table};

/// Column holding the sentinel in the auxiliary file.
pub const SENTINEL_COLUMN: &str = "x";

/// Reads the first value of column `x`. Files written by R carry an extra
/// unnamed row-name column, which is ignored.
pub fn load_sentinel(path: &Path) -> Result<f64> {
    let table = read_table(path)?;
    let sentinel = sentinel_from_table(&table)
        .with_context(|| format!("Failed to load sentinel from {}", path.display()))?;
    info!("📏 Sentinel distance {} loaded from {}", sentinel, path.display());
    Ok(sentinel)
}

pub fn parse_sentinel_csv(content: &str) -> Result<f64> {
    let table = read_table_from_reader(content.as_bytes())?;
    Ok(sentinel_from_table(&table)?)
}

fn sentinel_from_table(table: &Table) -> Result<f64, ScoringError> {
    let column = table.column_index(SENTINEL_COLUMN)?;
    if table.is_empty() {
        return Err(ScoringError::InvalidSentinel(
            "sentinel file has no data row".to_string(),
        ));
    }

    let raw = table.cell(0, column).trim();
    let sentinel: f64 = raw.parse().map_err(|_| {
        ScoringError::InvalidSentinel(format!("'{}' is not a number", raw))
    })?;
    validate_sentinel(sentinel)?;
    Ok(sentinel)
}
