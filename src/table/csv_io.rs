// src/table/csv_io.rs
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::Table;

const UTF8_BOM: char = '\u{feff}';

pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open table {}", path.display()))?;
    read_table_from_reader(file).with_context(|| format!("Failed to read table {}", path.display()))
}

pub fn read_table_from_reader<R: Read>(reader: R) -> Result<Table> {
    // Widths are checked by `Table::new` so a ragged file reports the data row.
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if let Some(first) = headers.first_mut() {
        *first = first.trim_start_matches(UTF8_BOM).to_string();
    }

    let mut rows = Vec::new();
    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse data row {}", row_idx))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(Table::new(headers, rows)?)
}

/// Writes the table next to its destination first and renames it into place,
/// so a failure part-way through never leaves a truncated file behind.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    write_table_to_writer(&mut tmp, table)
        .with_context(|| format!("Failed to write table {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync table {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move table into place at {}", path.display()))?;
    Ok(())
}

pub fn write_table_to_writer<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer
        .write_record(table.headers())
        .context("Failed to write header row")?;
    for row in table.rows() {
        csv_writer.write_record(row).context("Failed to write data row")?;
    }
    csv_writer.flush().context("Failed to flush table")?;
    Ok(())
}
