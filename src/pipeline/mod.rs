// src/pipeline/mod.rs
pub mod discovery;
pub mod driver;
pub mod sentinel;

pub use driver::{process_table, run_batch, BatchSummary, TableOutcome, TableStatus};
