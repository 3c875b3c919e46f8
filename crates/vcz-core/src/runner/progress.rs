//! Parser for the encoder's `key=value` progress protocol.

const OUT_TIME_KEY: &str = "out_time_us";

/// Turns cumulative `out_time_us` reports of one process into forward deltas.
///
/// Starts at zero for each process. Values that do not move forward, and
/// lines that do not parse, produce no delta.
#[derive(Debug, Default)]
pub struct OutTimeTracker {
    last_us: u64,
}

impl OutTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest cumulative value seen so far.
    pub fn last_us(&self) -> u64 {
        self.last_us
    }

    /// Feed one output line; returns the delta to credit, if any.
    pub fn observe(&mut self, line: &str) -> Option<u64> {
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != OUT_TIME_KEY {
            return None;
        }
        let current: u64 = value.trim().parse().ok()?;
        if current <= self.last_us {
            return None;
        }
        let delta = current - self.last_us;
        self.last_us = current;
        Some(delta)
    }
}
