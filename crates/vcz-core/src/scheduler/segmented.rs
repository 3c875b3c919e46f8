//! Segment-mode execution of a single job.
//!
//! Plan → validate-or-reset the workspace → encode missing segments in order
//! → concatenate into `<output>.merge.part` → rename → checkpoint → drop the
//! workspace. Any failure leaves the workspace in place for the next run.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::fingerprint::Fingerprint;
use crate::progress::NullProgress;
use crate::runner;
use crate::segmenter::{Prepared, Segment, SegmentPlan, Workspace};
use crate::storage;

use super::discover::probe_blocking;
use super::job::{duration_units, Job, JobResult};
use super::whole_file::report_run_error;
use super::Shared;

pub(super) async fn run_segmented(
    shared: &Shared,
    job: &Job,
    segment_seconds: u64,
    cancel: &CancellationToken,
) -> JobResult {
    let workspace = Workspace::for_job(&job.input_path, &job.output_path);
    let command = format!(
        "{} segmented input={} output={} workspace={}",
        shared.builder.program().to_string_lossy(),
        job.input_path.display(),
        job.output_path.display(),
        workspace.dir().display()
    );
    let mut result = JobResult::begin(job, command);

    let fingerprint = match Fingerprint::of(&job.input_path) {
        Ok(fp) => fp,
        Err(e) => return result.failed(format!("stat input failed: {}", e)),
    };
    result.original_size = fingerprint.size;

    let plan = SegmentPlan::new(
        job.input_path.to_string_lossy(),
        job.output_path.to_string_lossy(),
        fingerprint,
        segment_seconds,
        job.duration_secs,
    );
    match workspace.prepare(&plan) {
        Ok(Prepared::Resumed) => {
            tracing::info!(dir = %workspace.dir().display(), "resuming segmented job")
        }
        Ok(Prepared::Reset(_)) | Ok(Prepared::Fresh) => tracing::info!(
            dir = %workspace.dir().display(),
            segments = plan.total_segments,
            "starting segmented job"
        ),
        Err(e) => return result.failed(format!("prepare segment workspace failed: {}", e)),
    }

    for segment in plan.segments() {
        if cancel.is_cancelled() {
            return result.cancelled("cancelled");
        }
        if let Err(r) = encode_segment(shared, job, &workspace, &segment, cancel).await {
            return r.into_result(shared, result, cancel);
        }
    }

    let list = match workspace.write_concat_list(plan.total_segments) {
        Ok(list) => list,
        Err(e) => return result.failed(format!("build concat list failed: {}", e)),
    };
    let merge = storage::merge_path(&job.output_path);
    if let Err(e) = storage::remove_if_exists(&merge) {
        return result.failed(format!("remove stale merge file failed: {}", e));
    }
    let args = shared.builder.concat_args(&list, &merge);
    // Concatenation is not encoding work; it must not move the progress total.
    if let Err(e) = runner::run_process(shared.builder.program(), &args, &NullProgress, cancel).await
    {
        storage::discard(&merge);
        return report_run_error(shared, result, e, cancel);
    }
    if let Err(e) = storage::finalize(&merge, &job.output_path) {
        storage::discard(&merge);
        return result.failed(format!("finalize output failed: {:#}", e));
    }

    let new_size = storage::file_size(&job.output_path);
    shared.commit(job, fingerprint);
    if let Err(e) = workspace.remove() {
        tracing::warn!("could not remove segment workspace: {}", e);
    }
    tracing::info!(
        output = %job.output_path.display(),
        segments = plan.total_segments,
        "segmented job complete"
    );
    result.processed(new_size)
}

enum SegmentFailure {
    Run(runner::RunError),
    Other(String),
}

impl SegmentFailure {
    fn into_result(
        self,
        shared: &Shared,
        result: JobResult,
        cancel: &CancellationToken,
    ) -> JobResult {
        match self {
            SegmentFailure::Run(e) => report_run_error(shared, result, e, cancel),
            SegmentFailure::Other(reason) => result.failed(reason),
        }
    }
}

/// Encode one segment unless a finished, probe-valid file is already there.
async fn encode_segment(
    shared: &Shared,
    job: &Job,
    workspace: &Workspace,
    segment: &Segment,
    cancel: &CancellationToken,
) -> Result<(), SegmentFailure> {
    let final_path = workspace.segment_path(segment.index);
    if final_path.is_file() {
        match probe_blocking(Arc::clone(&shared.probe), final_path.clone()).await {
            Ok(secs) if secs > 0.0 => {
                tracing::debug!(index = segment.index, "segment already encoded");
                shared.progress.add(duration_units(secs));
                return Ok(());
            }
            Ok(_) | Err(_) => {
                tracing::info!(index = segment.index, "re-encoding unreadable segment");
                storage::remove_if_exists(&final_path).map_err(|e| {
                    SegmentFailure::Other(format!("remove invalid segment failed: {}", e))
                })?;
            }
        }
    }

    let temp = storage::temp_path(&final_path);
    storage::remove_if_exists(&temp)
        .map_err(|e| SegmentFailure::Other(format!("remove stale segment temp failed: {}", e)))?;
    let args = shared
        .builder
        .segment_args(&job.input_path, &temp, segment);
    tracing::debug!(
        index = segment.index,
        start = segment.start_secs,
        duration = segment.duration_secs,
        "encoding segment"
    );
    if let Err(e) =
        runner::run_process(shared.builder.program(), &args, shared.progress.as_ref(), cancel).await
    {
        storage::discard(&temp);
        return Err(SegmentFailure::Run(e));
    }
    if let Err(e) = storage::finalize(&temp, &final_path) {
        storage::discard(&temp);
        return Err(SegmentFailure::Other(format!(
            "finalize segment {} failed: {:#}",
            segment.index, e
        )));
    }
    Ok(())
}
