//! Job scheduler.
//!
//! Discovers jobs, picks segment mode (exactly one job) or batch mode
//! (admission-gated whole-file jobs), and drives the checkpoint store and
//! segment workspace. Every job yields exactly one `JobResult`.

mod batch;
mod discover;
mod job;
mod report;
mod segmented;
mod whole_file;

pub use discover::{Discovery, OverwriteDecider, SkipReason, SkippedItem};
pub use job::{duration_units, Job, JobResult, JobStatus};
pub use report::{reduction_percent, Summary};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::config::VczConfig;
use crate::encoder::CommandBuilder;
use crate::fingerprint::Fingerprint;
use crate::probe::DurationProbe;
use crate::progress::{announce, ProgressSink};

/// Knobs of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub workers: usize,
    pub segment_seconds: u64,
    pub segment_resume: bool,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &VczConfig) -> Self {
        Self {
            workers: cfg.effective_workers(),
            segment_seconds: cfg.effective_segment_seconds(),
            segment_resume: cfg.segment_resume,
        }
    }
}

/// Collaborators shared by every running job.
pub(crate) struct Shared {
    pub(crate) checkpoints: Arc<CheckpointStore>,
    pub(crate) builder: Arc<dyn CommandBuilder>,
    pub(crate) probe: Arc<dyn DurationProbe>,
    pub(crate) progress: Arc<dyn ProgressSink>,
}

impl Shared {
    /// Record a finished job. A failed save is reported but does not undo
    /// the job: the output is already in place.
    pub(crate) fn commit(&self, job: &Job, fingerprint: Fingerprint) {
        if let Err(e) =
            self.checkpoints
                .mark_completed(&job.input_path, &job.output_path, fingerprint)
        {
            tracing::error!(input = %job.input_path.display(), "saving checkpoint failed: {}", e);
            announce(
                self.progress.as_ref(),
                &format!("warning: could not save checkpoint: {}", e),
            );
        }
    }
}

pub struct Scheduler {
    settings: SchedulerSettings,
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        checkpoints: Arc<CheckpointStore>,
        builder: Arc<dyn CommandBuilder>,
        probe: Arc<dyn DurationProbe>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared {
                checkpoints,
                builder,
                probe,
                progress,
            }),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointStore> {
        &self.shared.checkpoints
    }

    /// Replace the progress sink (e.g. once the total is known after discovery).
    pub fn set_progress(&mut self, progress: Arc<dyn ProgressSink>) {
        let shared = Shared {
            checkpoints: Arc::clone(&self.shared.checkpoints),
            builder: Arc::clone(&self.shared.builder),
            probe: Arc::clone(&self.shared.probe),
            progress,
        };
        self.shared = Arc::new(shared);
    }

    /// Turn candidate inputs into jobs. Compressed names, fresh checkpoints,
    /// declined overwrites and failed probes are skipped, never failed.
    pub async fn discover(
        &self,
        candidates: &[PathBuf],
        output_dir: Option<&Path>,
        decider: &dyn OverwriteDecider,
    ) -> Discovery {
        discover::discover(&self.shared, candidates, output_dir, decider).await
    }

    /// True if `jobs` would run in segment mode.
    pub fn uses_segment_mode(&self, jobs: &[Job]) -> bool {
        self.settings.segment_resume && jobs.len() == 1 && jobs[0].duration_secs > 0.0
    }

    /// Run all jobs to completion (or cancellation). Returns one result per job.
    pub async fn run(&self, jobs: Vec<Job>, cancel: &CancellationToken) -> Vec<JobResult> {
        if jobs.is_empty() {
            return Vec::new();
        }
        if self.uses_segment_mode(&jobs) {
            let job = &jobs[0];
            tracing::info!(
                input = %job.input_path.display(),
                segment_seconds = self.settings.segment_seconds,
                "segment mode"
            );
            let result =
                segmented::run_segmented(&self.shared, job, self.settings.segment_seconds, cancel)
                    .await;
            return vec![result];
        }

        let workers = self.settings.workers.min(jobs.len()).max(1);
        tracing::info!(jobs = jobs.len(), workers, "batch mode");
        batch::run_batch(Arc::clone(&self.shared), jobs, workers, cancel).await
    }
}
