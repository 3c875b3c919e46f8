//! End-of-run summary.

use super::discover::SkippedItem;
use super::job::{JobResult, JobStatus};

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    /// Input bytes of processed jobs.
    pub original_bytes: u64,
    /// Output bytes of processed jobs.
    pub new_bytes: u64,
}

impl Summary {
    pub fn from_results(results: &[JobResult], skipped: &[SkippedItem]) -> Self {
        let mut s = Summary {
            total: results.len() + skipped.len(),
            skipped: skipped.len(),
            ..Summary::default()
        };
        for r in results {
            match r.status {
                JobStatus::Processed => {
                    s.processed += 1;
                    s.original_bytes += r.original_size;
                    s.new_bytes += r.new_size;
                }
                JobStatus::Failed => s.failed += 1,
                JobStatus::Cancelled => s.cancelled += 1,
            }
        }
        s
    }

    /// Bytes saved by processed jobs (negative if outputs grew).
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.new_bytes as i64
    }

    /// True when nothing failed (cancelled jobs are not failures).
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Percentage reduction from `original` to `new` (0 when `original` is 0).
pub fn reduction_percent(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - new as f64 / original as f64) * 100.0
}
