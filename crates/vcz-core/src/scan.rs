//! Candidate discovery and output naming.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::segmenter::WORKSPACE_ROOT_NAME;

/// Container extensions considered for compression (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov"];

/// Marker inserted before the extension of every output.
pub const COMPRESSED_MARKER: &str = ".compressed";

/// True if `path` has one of the video extensions.
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// True if the file stem already ends in `.compressed`.
pub fn is_compressed_name(path: &Path) -> bool {
    path.file_stem()
        .map(|s| {
            s.to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(COMPRESSED_MARKER)
        })
        .unwrap_or(false)
}

/// `<stem>.compressed<ext>`, inside `output_dir` if given, else beside the input.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, COMPRESSED_MARKER, ext.to_string_lossy()),
        None => format!("{}{}", stem, COMPRESSED_MARKER),
    };
    let dir = match output_dir {
        Some(d) => d.to_path_buf(),
        None => input.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
    };
    dir.join(name)
}

/// Input files under `root`: `root` itself if it is a file, else every video
/// file below it, sorted. Segment workspaces are not descended into.
/// I/O errors while walking abort the scan.
pub fn collect_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("cannot access {}", root.display()))?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut found = Vec::new();
    walk(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if file_type.is_dir() {
            if entry.file_name() != WORKSPACE_ROOT_NAME {
                walk(&path, found)?;
            }
        } else if is_video(&path) && (file_type.is_file() || path.is_file()) {
            found.push(path);
        }
    }
    Ok(())
}
