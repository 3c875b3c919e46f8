//! File lifecycle for encoder outputs.
//!
//! Encoders always write to a temp path beside the destination; the temp is
//! renamed over the final name only after the encoder succeeded, so a crash
//! never leaves a truncated file under the final name.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Suffix for the concatenation target of a segmented job.
pub const MERGE_SUFFIX: &str = ".merge.part";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o: OsString = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// Path for the temp file: appends `.part` to the final path (e.g. `a.mp4` → `a.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, TEMP_SUFFIX)
}

/// Path for the concat output of a segmented job (`a.mp4` → `a.mp4.merge.part`).
pub fn merge_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, MERGE_SUFFIX)
}

/// Atomically rename the temp file to the final path.
/// Fails if `final_path` is on a different filesystem.
pub fn finalize(temp_path: &Path, final_path: &Path) -> Result<()> {
    std::fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            final_path.display()
        )
    })
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Best-effort cleanup of a temp file; failures are only logged.
pub fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        tracing::warn!("could not remove {}: {}", path.display(), e);
    }
}

/// Size of `path` in bytes, or 0 if it cannot be read.
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
