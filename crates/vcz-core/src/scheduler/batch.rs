//! Batch mode: whole-file jobs behind a fixed-size admission gate.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::job::{Job, JobResult};
use super::whole_file::run_whole_file;
use super::Shared;

/// Runs `jobs` with at most `workers` encoders at once and returns one
/// result per job, in job order. Once `cancel` fires no further job is
/// admitted; those jobs come back as cancelled.
pub(super) async fn run_batch(
    shared: Arc<Shared>,
    jobs: Vec<Job>,
    workers: usize,
    cancel: &CancellationToken,
) -> Vec<JobResult> {
    let gate = Arc::new(Semaphore::new(workers.max(1)));
    let mut running: Vec<(Job, JoinHandle<JobResult>)> = Vec::with_capacity(jobs.len());
    let mut not_admitted = Vec::new();

    let mut queue = jobs.into_iter();
    while let Some(job) = queue.next() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            tracing::info!("run cancelled; not admitting remaining jobs");
            not_admitted.push(JobResult::not_started(&job));
            not_admitted.extend(queue.by_ref().map(|j| JobResult::not_started(&j)));
            break;
        };

        let shared = Arc::clone(&shared);
        let cancel = cancel.clone();
        let task_job = job.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            run_whole_file(&shared, &task_job, &cancel).await
        });
        running.push((job, handle));
    }

    let mut results = Vec::with_capacity(running.len() + not_admitted.len());
    for (job, handle) in running {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(input = %job.input_path.display(), "job task join: {}", e);
                results.push(JobResult::begin(&job, String::new()).failed(format!("job task join: {}", e)));
            }
        }
    }
    results.extend(not_admitted);
    results
}
