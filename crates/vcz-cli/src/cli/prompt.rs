//! Interactive overwrite confirmation.

use dialoguer::{console::Term, Confirm};
use std::path::Path;

/// Ask whether `output` may be overwritten. Defaults to no; a prompt error declines.
pub fn ask_overwrite(output: &Path) -> bool {
    let term = Term::stderr();
    // Start below any progress output already on the line.
    let _ = term.write_line("");
    match Confirm::new()
        .with_prompt(overwrite_prompt(output))
        .default(false)
        .interact_on(&term)
    {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!("overwrite prompt failed: {}", e);
            false
        }
    }
}

pub fn overwrite_prompt(output: &Path) -> String {
    format!("Overwrite {}?", output.display())
}
