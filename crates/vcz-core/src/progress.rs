//! Shared progress accounting, in microseconds of media processed.
//!
//! All jobs of a run feed one sink through `add`. Each encoder process only
//! contributes its own forward deltas, so the sink total is the sum of the
//! work done regardless of how updates interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Consumer of progress units. Must be safe to call from many workers at once.
pub trait ProgressSink: Send + Sync {
    /// Record `units` more microseconds of processed media.
    fn add(&self, units: u64);

    /// Remove any live display so a message can be printed cleanly.
    fn clear(&self) {}

    /// Redraw the live display after `clear`.
    fn render(&self) {}
}

/// Print a line around the live display: clear, write to stderr, redraw.
pub fn announce(sink: &dyn ProgressSink, line: &str) {
    sink.clear();
    eprintln!("{}", line);
    sink.render();
}

/// Monotonic atomic counter; the default sink when nothing is displayed.
#[derive(Debug)]
pub struct ProgressCounter {
    total: u64,
    done: AtomicU64,
    started: Instant,
}

impl ProgressCounter {
    /// Counter expecting `total` units (used only for fraction/ETA).
    pub fn new(total: u64) -> Self {
        Self {
            total,
            done: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Point-in-time snapshot for display.
    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            done_us: self.done(),
            total_us: self.total,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl ProgressSink for ProgressCounter {
    fn add(&self, units: u64) {
        self.done.fetch_add(units, Ordering::Relaxed);
    }
}

/// Sink that drops everything (e.g. for the concat step, which must not count twice).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn add(&self, _units: u64) {}
}

/// Snapshot of overall progress (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Media microseconds processed so far, across all jobs.
    pub done_us: u64,
    /// Total media microseconds selected for this run.
    pub total_us: u64,
    /// Elapsed wall time since the counter was created (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Media seconds processed per wall second (0 if elapsed is 0).
    pub fn speed(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        (self.done_us as f64 / 1_000_000.0) / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if nothing has been processed yet).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_us.saturating_sub(self.done_us);
        if remaining == 0 {
            return Some(0.0);
        }
        let speed = self.speed();
        if speed <= 0.0 {
            return None;
        }
        Some(remaining as f64 / 1_000_000.0 / speed)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_us == 0 {
            return 1.0;
        }
        (self.done_us as f64 / self.total_us as f64).min(1.0)
    }
}
