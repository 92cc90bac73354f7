// src/scoring/mod.rs - Distance aggregation and masking over a table of candidate pairs
pub mod columns;
pub mod pair;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ScoringError;
use crate::matching::fuzzy::TextProcessing;
use crate::table::Table;
use columns::{
    RequiredColumns, DIST, DIST_RAW, GRANTEE_SCORE_DIST, GRANTOR_SCORE_DIST, GROUP_FINAL_C_X,
    GROUP_FINAL_C_Y,
};
use pair::{score_pair, DistanceOverride, PairScore};

pub const DEFAULT_MISSING_TOKEN: &str = "NA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOptions {
    pub text_processing: TextProcessing,
    /// Cell values treated as missing. The first one is also used to write NaN.
    pub missing_tokens: Vec<String>,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            text_processing: TextProcessing::default(),
            missing_tokens: vec![DEFAULT_MISSING_TOKEN.to_string()],
        }
    }
}

impl ScoringOptions {
    fn nan_token(&self) -> &str {
        self.missing_tokens
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_MISSING_TOKEN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableScoringStats {
    pub rows: usize,
    pub downweighted_overrides: usize,
    pub self_pair_overrides: usize,
    pub missing_text_fields: usize,
    pub non_finite_distances: usize,
}

impl TableScoringStats {
    pub fn merge(&mut self, other: &TableScoringStats) {
        self.rows += other.rows;
        self.downweighted_overrides += other.downweighted_overrides;
        self.self_pair_overrides += other.self_pair_overrides;
        self.missing_text_fields += other.missing_text_fields;
        self.non_finite_distances += other.non_finite_distances;
    }
}

#[derive(Debug, Clone)]
pub struct ScoredTable {
    pub table: Table,
    pub stats: TableScoringStats,
}

/// Adds the fuzzy text distances, the combined distance and the normalized
/// group labels to every row, then masks `dist` for downweighted groups and
/// self-pairs. Rows keep their order and original cells.
///
/// Nothing is returned unless every row scored, so a failing table never
/// yields partial output.
pub fn score_table(
    table: Table,
    sentinel: f64,
    options: &ScoringOptions,
) -> Result<ScoredTable, ScoringError> {
    validate_sentinel(sentinel)?;
    let columns = RequiredColumns::resolve(&table)?;

    let mut stats = TableScoringStats {
        rows: table.len(),
        ..Default::default()
    };
    let mut scores: Vec<PairScore> = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let input = columns.extract(&table, row, &options.missing_tokens)?;
        stats.missing_text_fields += [input.grantor_x, input.grantor_y, input.grantee_x, input.grantee_y]
            .iter()
            .filter(|t| t.is_none())
            .count();

        let score = score_pair(&input, sentinel, options)?;
        match score.applied_override {
            DistanceOverride::Downweighted => stats.downweighted_overrides += 1,
            DistanceOverride::SelfPair => stats.self_pair_overrides += 1,
            DistanceOverride::None => {}
        }
        if !score.dist.is_finite() {
            stats.non_finite_distances += 1;
        }
        scores.push(score);
    }

    debug!(
        "Scored {} pairs: {} downweighted, {} self-pairs, {} non-finite",
        stats.rows, stats.downweighted_overrides, stats.self_pair_overrides, stats.non_finite_distances
    );

    let nan_token = options.nan_token();
    let number_column = |f: fn(&PairScore) -> f64| -> Vec<String> {
        scores.iter().map(|s| format_number(f(s), nan_token)).collect()
    };
    let grantor = number_column(|s| s.grantor_score_dist);
    let grantee = number_column(|s| s.grantee_score_dist);
    let dist_raw = number_column(|s| s.dist_raw);
    let dist = number_column(|s| s.dist);
    let group_x: Vec<String> = scores.iter().map(|s| s.group_final_c_x.clone()).collect();
    let group_y: Vec<String> = scores.iter().map(|s| s.group_final_c_y.clone()).collect();

    let mut table = table;
    table.set_column(GRANTOR_SCORE_DIST, grantor)?;
    table.set_column(GRANTEE_SCORE_DIST, grantee)?;
    table.set_column(DIST_RAW, dist_raw)?;
    table.set_column(DIST, dist)?;
    table.set_column(GROUP_FINAL_C_X, group_x)?;
    table.set_column(GROUP_FINAL_C_Y, group_y)?;

    Ok(ScoredTable { table, stats })
}

pub fn validate_sentinel(sentinel: f64) -> Result<(), ScoringError> {
    if !sentinel.is_finite() {
        return Err(ScoringError::InvalidSentinel(format!(
            "{} is not a finite number",
            sentinel
        )));
    }
    if sentinel < 0.0 {
        return Err(ScoringError::InvalidSentinel(format!(
            "{} is negative",
            sentinel
        )));
    }
    Ok(())
}

/// Shortest round-trip decimal; NaN as the missing token, infinities R-style.
pub fn format_number(value: f64, nan_token: &str) -> String {
    if value.is_nan() {
        nan_token.to_string()
    } else if value == f64::INFINITY {
        "Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}
