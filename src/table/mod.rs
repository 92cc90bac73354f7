// src/table/mod.rs - Column-preserving in-memory table of candidate pairs
pub mod csv_io;

use log::warn;

use crate::errors::ScoringError;

pub use csv_io::{read_table, read_table_from_reader, write_table, write_table_to_writer};

/// A headered table whose cells are kept exactly as read. Column order and
/// row order are never changed; derived columns are appended on the right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table, rejecting any row whose width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ScoringError> {
        if let Some((row, record)) = rows
            .iter()
            .enumerate()
            .find(|(_, record)| record.len() != headers.len())
        {
            return Err(ScoringError::RaggedRow {
                row,
                expected: headers.len(),
                found: record.len(),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ScoringError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ScoringError::MissingField {
                column: name.to_string(),
            })
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// Appends a column, or overwrites it in place if the name already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), ScoringError> {
        if values.len() != self.rows.len() {
            return Err(ScoringError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        match self.headers.iter().position(|h| h == name) {
            Some(idx) => {
                warn!("Column '{}' already present in input, overwriting it", name);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }
}
