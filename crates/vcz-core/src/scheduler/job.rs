//! Jobs and their outcomes.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::storage;

/// One input-to-output unit of work. Never mutated after discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Encoder write target; only renamed to `output_path` on success.
    pub temp_path: PathBuf,
    /// Probed once at discovery.
    pub duration_secs: f64,
}

impl Job {
    pub fn new(input_path: PathBuf, output_path: PathBuf, duration_secs: f64) -> Self {
        let temp_path = storage::temp_path(&output_path);
        Self {
            input_path,
            output_path,
            temp_path,
            duration_secs,
        }
    }

    /// Expected progress contribution of this job, in microseconds.
    pub fn progress_units(&self) -> u64 {
        duration_units(self.duration_secs)
    }
}

/// Seconds of media as progress units (microseconds).
pub fn duration_units(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1_000_000.0) as u64
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processed,
    Failed,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Processed => "Processed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        })
    }
}

/// Outcome of one job; produced exactly once per job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub reason: Option<String>,
    pub original_size: u64,
    pub new_size: u64,
    /// Human-readable encoder invocation.
    pub command: String,
}

impl JobResult {
    /// Pending result for `job`; finished with one of the status helpers.
    pub(crate) fn begin(job: &Job, command: impl Into<String>) -> Self {
        Self {
            input_path: job.input_path.clone(),
            output_path: job.output_path.clone(),
            status: JobStatus::Failed,
            reason: None,
            original_size: 0,
            new_size: 0,
            command: command.into(),
        }
    }

    /// Result for a job that was never admitted because the run was cancelled.
    pub(crate) fn not_started(job: &Job) -> Self {
        Self::begin(job, String::new()).cancelled("cancelled before start")
    }

    pub(crate) fn processed(mut self, new_size: u64) -> Self {
        self.status = JobStatus::Processed;
        self.reason = None;
        self.new_size = new_size;
        self
    }

    pub(crate) fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn cancelled(mut self, reason: impl Into<String>) -> Self {
        self.status = JobStatus::Cancelled;
        self.reason = Some(reason.into());
        self
    }

    pub fn is_processed(&self) -> bool {
        self.status == JobStatus::Processed
    }

    /// File name of the input, for compact report lines.
    pub fn display_name(&self) -> String {
        file_name(&self.input_path)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
