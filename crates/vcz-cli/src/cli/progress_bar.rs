//! Single-line terminal progress display over the shared progress counter.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vcz_core::progress::{ProgressCounter, ProgressSink, ProgressStats};

use super::report::format_duration;

const REDRAW_INTERVAL_MS: u64 = 500;
const BAR_WIDTH: usize = 30;

/// Progress sink that redraws one stderr line twice a second.
#[derive(Debug)]
pub struct TerminalProgress {
    counter: ProgressCounter,
    stop: CancellationToken,
    /// Serializes terminal writes between the ticker and announcements.
    term: Mutex<()>,
}

impl TerminalProgress {
    pub fn new(total_us: u64) -> Self {
        Self {
            counter: ProgressCounter::new(total_us),
            stop: CancellationToken::new(),
            term: Mutex::new(()),
        }
    }

    /// Redraw periodically until `finish`.
    pub fn spawn_ticker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(REDRAW_INTERVAL_MS));
            loop {
                tokio::select! {
                    _ = this.stop.cancelled() => break,
                    _ = tick.tick() => this.render(),
                }
            }
        })
    }

    /// Print a message above the progress line.
    pub fn announce(&self, line: &str) {
        vcz_core::progress::announce(self, line);
    }

    /// Draw the final state and leave the line in place.
    pub fn finish(&self) {
        self.stop.cancel();
        self.render();
        let _guard = self.term.lock().unwrap_or_else(|p| p.into_inner());
        eprintln!();
    }
}

impl ProgressSink for TerminalProgress {
    fn add(&self, units: u64) {
        self.counter.add(units);
    }

    fn clear(&self) {
        let _guard = self.term.lock().unwrap_or_else(|p| p.into_inner());
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K");
        let _ = err.flush();
    }

    fn render(&self) {
        let line = format_progress_line(&self.counter.stats());
        let _guard = self.term.lock().unwrap_or_else(|p| p.into_inner());
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K{}", line);
        let _ = err.flush();
    }
}

/// `[#####-----]  42.0%  0:05:00 / 0:12:00  1.8x  ETA 0:03:53`
pub fn format_progress_line(stats: &ProgressStats) -> String {
    let fraction = stats.fraction();
    let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let eta = stats
        .eta_secs()
        .map(format_duration)
        .unwrap_or_else(|| "?".to_string());
    format!(
        "[{}] {:5.1}%  {} / {}  {:.1}x  ETA {}",
        bar,
        fraction * 100.0,
        format_duration(stats.done_us as f64 / 1_000_000.0),
        format_duration(stats.total_us as f64 / 1_000_000.0),
        stats.speed(),
        eta
    )
}
