//! Whole-file execution of one job: encode to the temp path, rename, checkpoint.

use tokio_util::sync::CancellationToken;

use crate::fingerprint::Fingerprint;
use crate::progress::announce;
use crate::runner::{self, RunError};
use crate::storage;

use super::job::{file_name, Job, JobResult};
use super::Shared;

pub(super) async fn run_whole_file(
    shared: &Shared,
    job: &Job,
    cancel: &CancellationToken,
) -> JobResult {
    let args = shared.builder.encode_args(&job.input_path, &job.temp_path);
    let command = runner::describe_command(shared.builder.program(), &args);
    let mut result = JobResult::begin(job, command);

    // Snapshot before encoding: the checkpoint describes the input that was read.
    let fingerprint = match Fingerprint::of(&job.input_path) {
        Ok(fp) => fp,
        Err(e) => return result.failed(format!("stat input failed: {}", e)),
    };
    result.original_size = fingerprint.size;

    if let Some(parent) = job.output_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return result.failed(format!("create output directory failed: {}", e));
        }
    }
    if let Err(e) = storage::remove_if_exists(&job.temp_path) {
        return result.failed(format!("remove stale temp file failed: {}", e));
    }

    tracing::info!(input = %job.input_path.display(), "encoding");
    let run = runner::run_process(
        shared.builder.program(),
        &args,
        shared.progress.as_ref(),
        cancel,
    )
    .await;
    if let Err(e) = run {
        storage::discard(&job.temp_path);
        return report_run_error(shared, result, e, cancel);
    }

    if let Err(e) = storage::finalize(&job.temp_path, &job.output_path) {
        storage::discard(&job.temp_path);
        return result.failed(format!("finalize output failed: {:#}", e));
    }

    let new_size = storage::file_size(&job.output_path);
    shared.commit(job, fingerprint);
    tracing::info!(
        output = %job.output_path.display(),
        original = result.original_size,
        new = new_size,
        "encoded"
    );
    result.processed(new_size)
}

/// Fold a runner error into the job result, telling the user about it.
pub(super) fn report_run_error(
    shared: &Shared,
    result: JobResult,
    err: RunError,
    cancel: &CancellationToken,
) -> JobResult {
    let name = file_name(&result.input_path);
    if err.is_cancelled() || cancel.is_cancelled() {
        tracing::info!(input = %result.input_path.display(), "cancelled");
        announce(shared.progress.as_ref(), &format!("cancelled: {}", name));
        return result.cancelled("cancelled");
    }
    tracing::warn!(input = %result.input_path.display(), "encode failed: {}", err);
    announce(
        shared.progress.as_ref(),
        &format!("failed: {} ({})", name, err),
    );
    result.failed(err.to_string())
}
