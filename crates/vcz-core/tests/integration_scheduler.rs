//! Integration tests: discovery + scheduler against a scripted encoder.
//!
//! Covers idempotence via the checkpoint store, batch failures and
//! cancellation, segment resume and plan invalidation, and progress
//! accounting under concurrent jobs.

#![cfg(unix)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use common::fake_encoder::{
    batch_settings, overwrite_all, segment_settings, FakeProbe, Harness,
};
use vcz_core::checkpoint::key_for;
use vcz_core::probe::DurationProbe;
use vcz_core::progress::{NullProgress, ProgressCounter, ProgressSink};
use vcz_core::scheduler::{JobStatus, SkipReason, Summary};
use vcz_core::segmenter::Workspace;
use vcz_core::storage;

async fn wait_for(path: &std::path::Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("{} never appeared", path.display());
}

#[tokio::test]
async fn completed_job_is_checkpointed_and_skipped_until_input_changes() {
    let h = Harness::new();
    let a = h.input("a.mp4", 120);
    let s = h.scheduler(batch_settings(2), h.encoder(), Arc::new(NullProgress));

    let found = s.discover(&[a.clone()], None, &overwrite_all).await;
    assert_eq!(found.jobs.len(), 1);
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, JobStatus::Processed, "{:?}", results[0].reason);

    let output = h.root.join("a.compressed.mp4");
    assert!(output.exists());
    assert!(!storage::temp_path(&output).exists());
    assert_eq!(results[0].new_size, std::fs::metadata(&output).unwrap().len());

    let store = h.store();
    assert_eq!(store.len(), 1);
    let record = store.get(&a).unwrap();
    assert_eq!(record.input_file, key_for(&a));
    let meta = std::fs::metadata(&a).unwrap();
    assert_eq!(record.input_size, meta.len());

    // Second scan: fresh, so nothing is encoded again.
    let s = h.scheduler(batch_settings(2), h.encoder(), Arc::new(NullProgress));
    let again = s.discover(&[a.clone()], None, &overwrite_all).await;
    assert!(again.jobs.is_empty());
    assert_eq!(again.skipped[0].reason, SkipReason::CheckpointFresh);
    assert_eq!(h.invocations("encode").len(), 1);

    // Changing the input invalidates the record.
    std::fs::write(&a, "120\nrecut\n").unwrap();
    let changed = s.discover(&[a], None, &overwrite_all).await;
    assert_eq!(changed.jobs.len(), 1);
}

/// Counts how often the display was cleared for a message.
#[derive(Default)]
struct CountingDisplay {
    clears: AtomicUsize,
}

impl ProgressSink for CountingDisplay {
    fn add(&self, _units: u64) {}

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn unsaved_checkpoint_keeps_finished_jobs_processed() {
    let h = Harness::new();
    let inputs = vec![h.input("a.mp4", 30), h.input("b.mp4", 40)];
    let display = Arc::new(CountingDisplay::default());
    let s = h.scheduler(batch_settings(2), h.encoder(), display.clone());
    let found = s.discover(&inputs, None, &overwrite_all).await;
    assert_eq!(found.jobs.len(), 2);

    // A directory in place of the checkpoint file makes every save fail.
    std::fs::create_dir(h.store_path()).unwrap();
    let results = s.run(found.jobs, &CancellationToken::new()).await;

    for (r, input) in results.iter().zip(&inputs) {
        assert_eq!(r.status, JobStatus::Processed, "{:?}", r.reason);
        assert!(r.reason.is_none());
        assert!(r.output_path.exists());
        assert!(!storage::temp_path(&r.output_path).exists());
        assert!(s.checkpoints().get(input).is_some(), "record kept in memory");
    }
    assert_eq!(display.clears.load(Ordering::SeqCst), 2, "one warning per job");
    assert!(h.store_path().is_dir());
}

#[tokio::test]
async fn rerun_over_unchanged_set_encodes_nothing() {
    let h = Harness::new();
    let inputs: Vec<_> = ["a.mp4", "b.mkv", "c.mov"]
        .iter()
        .map(|n| h.input(n, 10))
        .collect();

    let s = h.scheduler(batch_settings(3), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&inputs, None, &overwrite_all).await;
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert!(results.iter().all(|r| r.is_processed()));
    assert_eq!(h.invocations("encode").len(), 3);

    let s = h.scheduler(batch_settings(3), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&inputs, None, &overwrite_all).await;
    assert!(found.jobs.is_empty());
    assert_eq!(found.skipped.len(), 3);
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert!(results.is_empty());
    assert_eq!(h.invocations("encode").len(), 3);
}

#[tokio::test]
async fn failed_job_leaves_no_temp_and_no_record() {
    let h = Harness::new();
    let good = h.input("good.mp4", 5);
    let bad = h.input("fail.mp4", 5);
    let s = h.scheduler(batch_settings(2), h.encoder(), Arc::new(NullProgress));

    let found = s.discover(&[good.clone(), bad.clone()], None, &overwrite_all).await;
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results.len(), 2);

    let failed = results.iter().find(|r| r.input_path == bad).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    let reason = failed.reason.as_deref().unwrap();
    assert!(reason.contains("simulated encoder failure"), "{reason}");
    assert!(!failed.command.is_empty());

    let bad_out = h.root.join("fail.compressed.mp4");
    assert!(!bad_out.exists());
    assert!(!storage::temp_path(&bad_out).exists());

    let store = h.store();
    assert!(store.get(&bad).is_none());
    assert!(store.get(&good).is_some());

    let summary = Summary::from_results(&results, &found.skipped);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn cancelling_whole_file_job_is_atomic() {
    let h = Harness::new();
    let input = h.input("hang.mp4", 60);
    let s = h.scheduler(batch_settings(2), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let job = found.jobs[0].clone();

    let cancel = CancellationToken::new();
    let temp = job.temp_path.clone();
    let output = job.output_path.clone();
    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for(&temp).await;
            cancel.cancel();
        })
    };
    let results = tokio::time::timeout(Duration::from_secs(15), s.run(found.jobs, &cancel))
        .await
        .expect("cancellation must stop the encoder");
    trigger.await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, JobStatus::Cancelled);
    assert!(!output.exists(), "no final output after cancel");
    assert!(!job.temp_path.exists(), "temp output removed");
    assert!(h.store().get(&input).is_none());
}

#[tokio::test]
async fn cancelled_run_still_reports_unadmitted_jobs() {
    let h = Harness::new();
    let inputs = vec![
        h.input("hang.mp4", 60),
        h.input("b.mp4", 5),
        h.input("c.mp4", 5),
    ];
    let s = h.scheduler(batch_settings(1), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&inputs, None, &overwrite_all).await;
    assert_eq!(found.jobs.len(), 3);

    let cancel = CancellationToken::new();
    let temp = found.jobs[0].temp_path.clone();
    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for(&temp).await;
            cancel.cancel();
        })
    };
    let results = tokio::time::timeout(Duration::from_secs(15), s.run(found.jobs, &cancel))
        .await
        .expect("run returns after cancel");
    trigger.await.unwrap();

    assert_eq!(results.len(), 3, "every job has a result");
    assert!(results.iter().all(|r| r.status == JobStatus::Cancelled));
    assert_eq!(results[0].input_path, inputs[0]);
    assert_eq!(h.invocations("hang").len(), 1);
    assert!(h.invocations("encode").is_empty());
    assert!(h.store().is_empty());
}

#[tokio::test]
async fn progress_total_is_sum_of_job_durations() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..4 {
        let h = Harness::new();
        let count = rng.random_range(2..=6);
        let inputs: Vec<_> = (0..count)
            .map(|i| h.input(&format!("r{round}_{i}.mp4"), rng.random_range(1..=90)))
            .collect();
        let workers = rng.random_range(1..=count);

        let counter = Arc::new(ProgressCounter::new(0));
        let s = h.scheduler(batch_settings(workers), h.encoder(), counter.clone());
        let found = s.discover(&inputs, None, &overwrite_all).await;
        let expected = found.total_progress_units();
        let results = s.run(found.jobs, &CancellationToken::new()).await;

        assert!(results.iter().all(|r| r.is_processed()));
        assert_eq!(counter.done(), expected, "round {round}, workers {workers}");
    }
}

#[tokio::test]
async fn single_job_runs_segmented_and_cleans_up() {
    let h = Harness::new();
    let input = h.input("long.mp4", 150);
    let counter = Arc::new(ProgressCounter::new(0));
    let s = h.scheduler(segment_settings(60), h.encoder(), counter.clone());

    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    assert!(s.uses_segment_mode(&found.jobs));
    let output = found.jobs[0].output_path.clone();
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results[0].status, JobStatus::Processed, "{:?}", results[0].reason);

    assert_eq!(h.invocations("segment").len(), 3);
    assert_eq!(h.invocations("concat").len(), 1);
    assert_eq!(FakeProbe.probe_duration(&output).unwrap(), 150.0);
    assert_eq!(counter.done(), 150_000_000);

    let workspace = Workspace::for_job(&input, &output);
    assert!(!workspace.dir().exists());
    assert!(!storage::merge_path(&output).exists());
    assert!(h.store().get(&input).is_some());
}

#[tokio::test]
async fn segment_resume_encodes_only_missing_segments() {
    let h = Harness::new();
    let input = h.input("long.mp4", 240);

    // First run dies at segment 2 of 4.
    let mut encoder = h.encoder();
    encoder.fail_from_segment = Some(2);
    let s = h.scheduler(segment_settings(60), encoder, Arc::new(NullProgress));
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let output = found.jobs[0].output_path.clone();
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results[0].status, JobStatus::Failed);
    assert!(!output.exists());
    assert!(h.store().get(&input).is_none());

    let workspace = Workspace::for_job(&input, &output);
    assert!(workspace.segment_path(0).exists());
    assert!(workspace.segment_path(1).exists());
    assert!(!workspace.segment_path(2).exists());
    assert!(!storage::temp_path(&workspace.segment_path(2)).exists());
    assert_eq!(h.invocations("segment").len(), 2);

    // Second run picks up at segment 2.
    let counter = Arc::new(ProgressCounter::new(0));
    let s = h.scheduler(segment_settings(60), h.encoder(), counter.clone());
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results[0].status, JobStatus::Processed, "{:?}", results[0].reason);

    let segments = h.invocations("segment");
    assert_eq!(segments.len(), 4, "2 from the first run, 2 resumed");
    assert!(segments[2].ends_with(" 2"));
    assert!(segments[3].ends_with(" 3"));
    assert_eq!(FakeProbe.probe_duration(&output).unwrap(), 240.0);
    // Reused segments are credited, so the total still covers the whole file.
    assert_eq!(counter.done(), 240_000_000);
    assert!(!workspace.dir().exists());
}

#[tokio::test]
async fn changed_segment_length_discards_previous_segments() {
    let h = Harness::new();
    let input = h.input("long.mp4", 120);

    let mut encoder = h.encoder();
    encoder.fail_from_segment = Some(3);
    let s = h.scheduler(segment_settings(30), encoder, Arc::new(NullProgress));
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results[0].status, JobStatus::Failed);
    assert_eq!(h.invocations("segment").len(), 3);

    // 30s segments 0 and 1 are valid files, but under a 60s plan they must not be reused.
    let s = h.scheduler(segment_settings(60), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let output = found.jobs[0].output_path.clone();
    let results = s.run(found.jobs, &CancellationToken::new()).await;
    assert_eq!(results[0].status, JobStatus::Processed, "{:?}", results[0].reason);

    let segments = h.invocations("segment");
    assert_eq!(segments.len(), 3 + 2);
    assert!(segments[3].ends_with(" 60 0"));
    assert!(segments[4].ends_with(" 60 1"));
    assert_eq!(FakeProbe.probe_duration(&output).unwrap(), 120.0);
}

#[tokio::test]
async fn cancelled_segmented_job_keeps_workspace() {
    let h = Harness::new();
    let input = h.input("hang.mp4", 120);
    let s = h.scheduler(segment_settings(60), h.encoder(), Arc::new(NullProgress));
    let found = s.discover(&[input.clone()], None, &overwrite_all).await;
    let output = found.jobs[0].output_path.clone();
    let workspace = Workspace::for_job(&input, &output);

    let cancel = CancellationToken::new();
    let seg_temp = storage::temp_path(&workspace.segment_path(0));
    let trigger = {
        let cancel = cancel.clone();
        let seg_temp = seg_temp.clone();
        tokio::spawn(async move {
            wait_for(&seg_temp).await;
            cancel.cancel();
        })
    };
    let results = tokio::time::timeout(Duration::from_secs(15), s.run(found.jobs, &cancel))
        .await
        .expect("cancellation must stop the segment encoder");
    trigger.await.unwrap();

    assert_eq!(results[0].status, JobStatus::Cancelled);
    assert!(!output.exists());
    assert!(!seg_temp.exists());
    assert!(workspace.meta_path().exists(), "plan kept for the next run");
    assert!(h.store().get(&input).is_none());
}
