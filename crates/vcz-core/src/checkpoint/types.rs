//! On-disk shape of the checkpoint file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fingerprint::Fingerprint;

/// "This input was fully transcoded to this output."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub input_file: String,
    pub output_file: String,
    pub input_size: u64,
    pub input_mod_unix: i64,
    /// RFC 3339 completion time.
    pub completed_at: String,
}

impl CheckpointRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            size: self.input_size,
            mod_unix: self.input_mod_unix,
        }
    }
}

/// Whole checkpoint file: absolute input path → record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub completed: BTreeMap<String, CheckpointRecord>,
}
