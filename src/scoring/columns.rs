// src/scoring/columns.rs - Column names and per-row extraction of scoring inputs

use crate::errors::ScoringError;
use crate::table::Table;

pub const UNIQUE_ID_X: &str = "unique_id.x";
pub const UNIQUE_ID_Y: &str = "unique_id.y";
pub const GROUP_FINAL_X: &str = "group_final.x";
pub const GROUP_FINAL_Y: &str = "group_final.y";
pub const GRANTOR_X: &str = "grantor.x";
pub const GRANTOR_Y: &str = "grantor.y";
pub const GRANTEE_X: &str = "alsgrantee.x";
pub const GRANTEE_Y: &str = "alsgrantee.y";
pub const GRANTOR_WEIGHT: &str = "grantor_weight";
pub const GRANTEE_WEIGHT: &str = "grantee_weight";

/// The precomputed distance components, in the order they are summed.
pub const PRECOMPUTED_DISTANCES: [&str; 6] = [
    "volpage_dist",
    "recordno_dist",
    "insttype_dist",
    "royalty_dist",
    "startdate_dist",
    "cluster_exprdate_dist",
];

pub const GRANTOR_SCORE_DIST: &str = "grantor_score_dist";
pub const GRANTEE_SCORE_DIST: &str = "grantee_score_dist";
pub const DIST_RAW: &str = "dist_raw";
pub const DIST: &str = "dist";
pub const GROUP_FINAL_C_X: &str = "group_final_C.x";
pub const GROUP_FINAL_C_Y: &str = "group_final_C.y";

/// Columns appended by scoring, in output order.
pub const DERIVED_COLUMNS: [&str; 6] = [
    GRANTOR_SCORE_DIST,
    GRANTEE_SCORE_DIST,
    DIST_RAW,
    DIST,
    GROUP_FINAL_C_X,
    GROUP_FINAL_C_Y,
];

/// Positions of every required column, resolved once per table.
#[derive(Debug, Clone)]
pub struct RequiredColumns {
    unique_id_x: usize,
    unique_id_y: usize,
    group_final_x: usize,
    group_final_y: usize,
    grantor_x: usize,
    grantor_y: usize,
    grantee_x: usize,
    grantee_y: usize,
    grantor_weight: usize,
    grantee_weight: usize,
    distances: [usize; 6],
}

impl RequiredColumns {
    /// Fails with `MissingField` on the first absent column.
    pub fn resolve(table: &Table) -> Result<Self, ScoringError> {
        let mut distances = [0usize; 6];
        for (slot, name) in distances.iter_mut().zip(PRECOMPUTED_DISTANCES) {
            *slot = table.column_index(name)?;
        }

        Ok(Self {
            unique_id_x: table.column_index(UNIQUE_ID_X)?,
            unique_id_y: table.column_index(UNIQUE_ID_Y)?,
            group_final_x: table.column_index(GROUP_FINAL_X)?,
            group_final_y: table.column_index(GROUP_FINAL_Y)?,
            grantor_x: table.column_index(GRANTOR_X)?,
            grantor_y: table.column_index(GRANTOR_Y)?,
            grantee_x: table.column_index(GRANTEE_X)?,
            grantee_y: table.column_index(GRANTEE_Y)?,
            grantor_weight: table.column_index(GRANTOR_WEIGHT)?,
            grantee_weight: table.column_index(GRANTEE_WEIGHT)?,
            distances,
        })
    }

    /// Pulls one row's scoring inputs out of the table, parsing numbers.
    pub fn extract<'a>(
        &self,
        table: &'a Table,
        row: usize,
        missing_tokens: &[String],
    ) -> Result<PairInput<'a>, ScoringError> {
        let text = move |col: usize| -> Option<&'a str> {
            let value = table.cell(row, col);
            if is_missing(value, missing_tokens) {
                None
            } else {
                Some(value)
            }
        };
        let identifier = move |col: usize| -> Option<&'a str> {
            text(col).map(str::trim).filter(|id| !id.is_empty())
        };
        let number = move |col: usize| -> Result<f64, ScoringError> {
            parse_number(table.cell(row, col), missing_tokens).ok_or_else(|| {
                ScoringError::InvalidNumber {
                    column: table.headers()[col].clone(),
                    row,
                    value: table.cell(row, col).to_string(),
                }
            })
        };

        let mut distances = [0.0f64; 6];
        for (value, &col) in distances.iter_mut().zip(self.distances.iter()) {
            *value = number(col)?;
        }

        Ok(PairInput {
            row,
            unique_id_x: identifier(self.unique_id_x),
            unique_id_y: identifier(self.unique_id_y),
            group_final_x: text(self.group_final_x).unwrap_or(""),
            group_final_y: text(self.group_final_y).unwrap_or(""),
            grantor_x: text(self.grantor_x),
            grantor_y: text(self.grantor_y),
            grantee_x: text(self.grantee_x),
            grantee_y: text(self.grantee_y),
            grantor_weight: number(self.grantor_weight)?,
            grantee_weight: number(self.grantee_weight)?,
            distances,
        })
    }
}

/// One record pair, borrowed from its table. `None` text means the cell held a
/// missing-value token.
#[derive(Debug, Clone, PartialEq)]
pub struct PairInput<'a> {
    pub row: usize,
    /// `None` for an empty or missing identifier; it never matches anything.
    pub unique_id_x: Option<&'a str>,
    pub unique_id_y: Option<&'a str>,
    pub group_final_x: &'a str,
    pub group_final_y: &'a str,
    pub grantor_x: Option<&'a str>,
    pub grantor_y: Option<&'a str>,
    pub grantee_x: Option<&'a str>,
    pub grantee_y: Option<&'a str>,
    pub grantor_weight: f64,
    pub grantee_weight: f64,
    /// Same order as `PRECOMPUTED_DISTANCES`.
    pub distances: [f64; 6],
}

pub fn is_missing(value: &str, missing_tokens: &[String]) -> bool {
    let trimmed = value.trim();
    missing_tokens.iter().any(|t| t == trimmed)
}

/// Empty cells and missing-value tokens read as NaN; anything else must parse.
pub fn parse_number(value: &str, missing_tokens: &[String]) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || missing_tokens.iter().any(|t| t == trimmed) {
        return Some(f64::NAN);
    }
    trimmed.parse::<f64>().ok()
}
