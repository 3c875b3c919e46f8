//! Discovery: turn candidate paths into jobs, recording why the rest were skipped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::probe::DurationProbe;
use crate::scan;

use super::job::Job;
use super::Shared;

/// Decides whether an existing output may be overwritten.
pub trait OverwriteDecider {
    fn should_overwrite(&self, output: &Path) -> bool;
}

impl<F> OverwriteDecider for F
where
    F: Fn(&Path) -> bool,
{
    fn should_overwrite(&self, output: &Path) -> bool {
        self(output)
    }
}

/// Why a candidate did not become a job. None of these are job failures.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    AlreadyCompressed,
    CheckpointFresh,
    UserDeclined,
    ProbeFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyCompressed => f.write_str("file name marks it as already compressed"),
            SkipReason::CheckpointFresh => f.write_str("already completed (checkpoint)"),
            SkipReason::UserDeclined => f.write_str("output exists, overwrite declined"),
            SkipReason::ProbeFailed(e) => write!(f, "could not read duration: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub input_path: PathBuf,
    pub reason: SkipReason,
}

/// Jobs to run plus the skipped candidates.
#[derive(Debug, Default)]
pub struct Discovery {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SkippedItem>,
    pub total_duration_secs: f64,
}

impl Discovery {
    /// Progress total for all jobs, in microseconds.
    pub fn total_progress_units(&self) -> u64 {
        self.jobs.iter().map(Job::progress_units).sum()
    }
}

pub(super) async fn discover(
    shared: &Shared,
    candidates: &[PathBuf],
    output_dir: Option<&Path>,
    decider: &dyn OverwriteDecider,
) -> Discovery {
    let mut found = Discovery::default();
    for candidate in candidates {
        let input = std::fs::canonicalize(candidate).unwrap_or_else(|_| candidate.clone());
        let skip = |reason| SkippedItem {
            input_path: input.clone(),
            reason,
        };

        if scan::is_compressed_name(&input) {
            found.skipped.push(skip(SkipReason::AlreadyCompressed));
            continue;
        }
        let output = scan::output_path_for(&input, output_dir);
        if shared.checkpoints.is_fresh(&input, &output) {
            tracing::debug!(input = %input.display(), "checkpoint fresh, skipping");
            found.skipped.push(skip(SkipReason::CheckpointFresh));
            continue;
        }
        if output.exists() && !decider.should_overwrite(&output) {
            found.skipped.push(skip(SkipReason::UserDeclined));
            continue;
        }

        match probe_blocking(Arc::clone(&shared.probe), input.clone()).await {
            Ok(duration) => {
                found.total_duration_secs += duration;
                found.jobs.push(Job::new(input, output, duration));
            }
            Err(e) => {
                tracing::warn!(input = %input.display(), "duration probe failed: {}", e);
                found.skipped.push(skip(SkipReason::ProbeFailed(e)));
            }
        }
    }
    tracing::info!(
        jobs = found.jobs.len(),
        skipped = found.skipped.len(),
        total_secs = found.total_duration_secs,
        "discovery done"
    );
    found
}

/// Run the (blocking) probe off the async runtime.
pub(super) async fn probe_blocking(
    probe: Arc<dyn DurationProbe>,
    path: PathBuf,
) -> Result<f64, String> {
    tokio::task::spawn_blocking(move || probe.probe_duration(&path))
        .await
        .map_err(|e| format!("probe task join: {}", e))?
        .map_err(|e| e.to_string())
}
