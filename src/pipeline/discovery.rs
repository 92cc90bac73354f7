// src/pipeline/discovery.rs - Finding input tables and naming their outputs
use anyhow::{bail, Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Every regular, non-hidden file in `input_dir` with the given extension,
/// sorted by file name. Hidden entries cover `.DS_Store` and editor droppings.
pub fn discover_tables(input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to list input directory {}", input_dir.display()))?;

    let mut tables = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        if name.starts_with('.') {
            debug!("Skipping hidden entry {}", name);
            continue;
        }
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        // Symlinked tables are followed; directories are not tables.
        let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
        if !is_file {
            debug!("Skipping non-file entry {}", name);
            continue;
        }
        if !has_extension(&path, extension) {
            debug!("Skipping {} (not a .{} table)", name, extension);
            continue;
        }
        tables.push(path);
    }

    tables.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(tables)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// `<name up to the first dot><suffix>.<extension>` inside `output_dir`.
pub fn output_path_for(
    input: &Path,
    output_dir: &Path,
    suffix: &str,
    extension: &str,
) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .with_context(|| format!("Input path {} has no file name", input.display()))?
        .to_string_lossy();
    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        bail!("Cannot derive an output name from {}", input.display());
    }
    Ok(output_dir.join(format!("{}{}.{}", stem, suffix, extension)))
}

/// Pairs every input with its output path, failing if two inputs would
/// overwrite the same output.
pub fn plan_outputs(
    inputs: &[PathBuf],
    output_dir: &Path,
    suffix: &str,
    extension: &str,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::new();
    let mut plan = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output = output_path_for(input, output_dir, suffix, extension)?;
        if let Some(previous) = seen.insert(output.clone(), input) {
            bail!(
                "Inputs {} and {} would both be written to {}",
                previous.display(),
                input.display(),
                output.display()
            );
        }
        plan.push((input.clone(), output));
    }
    Ok(plan)
}
