//! Cheap "file unchanged" check: `(size, modification time)`.
//!
//! Used instead of a content hash both for checkpoint freshness and for
//! deciding whether a segment workspace still belongs to its input.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Size and mtime (whole seconds since the Unix epoch) of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    pub mod_unix: i64,
}

impl Fingerprint {
    /// Stat `path` and capture its fingerprint.
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mod_unix = match meta.modified()?.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        };
        Ok(Self {
            size: meta.len(),
            mod_unix,
        })
    }

    /// True if `path` currently has this fingerprint. Unreadable files never match.
    pub fn matches(&self, path: &Path) -> bool {
        Self::of(path).map(|now| now == *self).unwrap_or(false)
    }
}
