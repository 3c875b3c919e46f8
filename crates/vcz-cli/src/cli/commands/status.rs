//! `vcz status` – list checkpoint records for an input.

use anyhow::{Context, Result};
use std::path::Path;
use vcz_core::checkpoint::{self, CheckpointStore};

pub fn run_status(input: &Path, output_dir: Option<&Path>) -> Result<()> {
    let path = checkpoint::default_path(input, output_dir);
    let store = CheckpointStore::load(&path)
        .with_context(|| format!("load checkpoint {}", path.display()))?;
    let records = store.records();
    if records.is_empty() {
        println!("No completed files recorded in {}.", path.display());
        return Ok(());
    }
    println!("{:<7} {:<26} {}", "STATE", "COMPLETED", "INPUT -> OUTPUT");
    for r in records {
        let state = if checkpoint::record_is_fresh(&r, Path::new(&r.output_file)) {
            "done"
        } else {
            "stale"
        };
        println!(
            "{:<7} {:<26} {} -> {}",
            state, r.completed_at, r.input_file, r.output_file
        );
    }
    Ok(())
}
