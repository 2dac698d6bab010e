//! CLI subcommands.
//!
//! Submodules:
//! - `plan`: diff two field lists and preview SQL without executing
//! - `enqueue`: diff two field lists and queue the migrations
//! - `history`: migration audit log for a form
//! - `rollback`: reverse an eligible migration
//! - `backups`: list / expiring / restore
//! - `cleanup`: age-based backup deletion
//! - `status`: queue counts
//! - `worker`: run the queue workers and the retention sweeper

pub mod backups;
pub mod cleanup;
pub mod enqueue;
pub mod history;
pub mod plan;
pub mod rollback;
pub mod status;
pub mod worker;

use anyhow::{Context, Result};

use formshift_core::{diff_fields, ChangeIntent, FieldDef};

/// Read two field-list JSON files and diff them into change intents.
pub fn load_and_diff(old_path: &str, new_path: &str) -> Result<Vec<ChangeIntent>> {
    let old = read_fields(old_path)?;
    let new = read_fields(new_path)?;
    Ok(diff_fields(&old, &new))
}

fn read_fields(path: &str) -> Result<Vec<FieldDef>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read field list {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("invalid field list in {path}"))
}
