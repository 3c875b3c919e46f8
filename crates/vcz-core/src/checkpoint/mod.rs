//! Persistent record of completed jobs (JSON, one file per scan root).
//!
//! A record is trusted only while the input still has the recorded
//! fingerprint and the output still exists. Saves go through a temp file
//! and a rename so a crash mid-save keeps the previous file intact.

mod types;

pub use types::{CheckpointRecord, CheckpointState};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::fingerprint::Fingerprint;
use crate::storage;

/// File name of the checkpoint store.
pub const CHECKPOINT_FILE_NAME: &str = ".vcz-resume.json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed checkpoint file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the store lives: the output directory if given, else the scanned
/// directory, else the directory holding a single scanned file.
pub fn default_path(input_root: &Path, output_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = output_dir {
        return dir.join(CHECKPOINT_FILE_NAME);
    }
    if input_root.is_dir() {
        return input_root.join(CHECKPOINT_FILE_NAME);
    }
    input_root
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CHECKPOINT_FILE_NAME)
}

/// Key used for an input: its string form (callers pass canonical absolute paths).
pub fn key_for(input: &Path) -> String {
    input.to_string_lossy().into_owned()
}

/// Read a checkpoint file. Missing or blank files yield an empty state.
pub fn load_state(path: &Path) -> Result<CheckpointState, CheckpointError> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CheckpointState::default()),
        Err(e) => return Err(io_err(path)(e)),
    };
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(CheckpointState::default());
    }
    serde_json::from_slice(&data).map_err(|source| CheckpointError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `state` to `path` via `path.tmp` + rename.
pub fn save_state(path: &Path, state: &CheckpointState) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    let json = serde_json::to_vec_pretty(state).map_err(CheckpointError::Encode)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        storage::discard(&tmp);
        return Err(io_err(path)(e));
    }
    Ok(())
}

/// Shared checkpoint store. All mutation happens under one mutex, and each
/// completion is persisted before the lock is released.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<CheckpointState>,
}

impl CheckpointStore {
    /// Load the store at `path`; a missing file is a first run, a malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let state = load_state(&path)?;
        tracing::debug!(
            path = %path.display(),
            records = state.completed.len(),
            "loaded checkpoint store"
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, CheckpointState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record for `input`, if any.
    pub fn get(&self, input: &Path) -> Option<CheckpointRecord> {
        self.lock().completed.get(&key_for(input)).cloned()
    }

    /// All records, ordered by input path.
    pub fn records(&self) -> Vec<CheckpointRecord> {
        self.lock().completed.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff `input` was completed to `output`, the input still has the
    /// recorded fingerprint, and `output` still exists.
    pub fn is_fresh(&self, input: &Path, output: &Path) -> bool {
        let Some(record) = self.get(input) else {
            return false;
        };
        record_is_fresh(&record, output)
    }

    /// Insert or overwrite the record for `input`, then persist immediately.
    ///
    /// The in-memory record is kept even when the save fails; the next
    /// successful save writes it out.
    pub fn mark_completed(
        &self,
        input: &Path,
        output: &Path,
        fingerprint: Fingerprint,
    ) -> Result<(), CheckpointError> {
        let record = CheckpointRecord {
            input_file: key_for(input),
            output_file: output.to_string_lossy().into_owned(),
            input_size: fingerprint.size,
            input_mod_unix: fingerprint.mod_unix,
            completed_at: chrono::Local::now().to_rfc3339(),
        };
        let mut state = self.lock();
        state.completed.insert(record.input_file.clone(), record);
        save_state(&self.path, &state)
    }
}

/// Freshness of one record against the current filesystem.
pub fn record_is_fresh(record: &CheckpointRecord, output: &Path) -> bool {
    if Path::new(&record.output_file) != output {
        return false;
    }
    if !record.fingerprint().matches(Path::new(&record.input_file)) {
        return false;
    }
    output.exists()
}
