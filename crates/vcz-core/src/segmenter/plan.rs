//! Time-segment planning for one input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::Fingerprint;

/// A single segment: time range `[start_secs, start_secs + duration_secs)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Persisted plan for a segmented job (`resume_meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlan {
    pub input_file: String,
    pub output_file: String,
    pub input_size: u64,
    pub input_mod_unix: i64,
    pub segment_seconds: u64,
    pub duration_sec: f64,
    pub total_segments: usize,
}

/// Number of segments for `duration_secs` split into `segment_seconds` pieces (at least 1).
pub fn segment_count(duration_secs: f64, segment_seconds: u64) -> usize {
    if segment_seconds == 0 || !(duration_secs > 0.0) {
        return 1;
    }
    ((duration_secs / segment_seconds as f64).ceil() as usize).max(1)
}

impl SegmentPlan {
    /// Fresh plan for a job from its current input fingerprint.
    pub fn new(
        input_file: impl Into<String>,
        output_file: impl Into<String>,
        fingerprint: Fingerprint,
        segment_seconds: u64,
        duration_sec: f64,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            output_file: output_file.into(),
            input_size: fingerprint.size,
            input_mod_unix: fingerprint.mod_unix,
            segment_seconds,
            duration_sec,
            total_segments: segment_count(duration_sec, segment_seconds),
        }
    }

    /// Segment `index`, clipped to the remaining duration.
    /// Returns None when nothing of the input is left at that index.
    pub fn segment(&self, index: usize) -> Option<Segment> {
        if index >= self.total_segments {
            return None;
        }
        let length = self.segment_seconds as f64;
        let start = index as f64 * length;
        let left = self.duration_sec - start;
        let duration = left.min(length);
        if duration <= 0.0 {
            return None;
        }
        Some(Segment {
            index,
            start_secs: start,
            duration_secs: duration,
        })
    }

    /// All non-empty segments in order.
    pub fn segments(&self) -> Vec<Segment> {
        (0..self.total_segments)
            .filter_map(|i| self.segment(i))
            .collect()
    }

    /// Compare a persisted plan against this freshly computed one.
    ///
    /// Duration is deliberately not compared: probes of the same file may
    /// differ in the last digits. Identity, fingerprint and segmentation are.
    pub fn check_reusable(&self, persisted: &SegmentPlan) -> Result<(), PlanMismatch> {
        let identity_changed =
            self.input_file != persisted.input_file || self.output_file != persisted.output_file;
        let input_changed = self.input_size != persisted.input_size
            || self.input_mod_unix != persisted.input_mod_unix;
        let segmentation_changed = self.segment_seconds != persisted.segment_seconds
            || self.total_segments != persisted.total_segments;
        if identity_changed || input_changed || segmentation_changed {
            return Err(PlanMismatch {
                identity_changed,
                input_changed,
                segmentation_changed,
            });
        }
        Ok(())
    }
}

/// Why a persisted segment plan cannot be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanMismatch {
    pub identity_changed: bool,
    pub input_changed: bool,
    pub segmentation_changed: bool,
}

impl fmt::Display for PlanMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.identity_changed {
            parts.push("input/output paths");
        }
        if self.input_changed {
            parts.push("input fingerprint");
        }
        if self.segmentation_changed {
            parts.push("segmentation");
        }
        write!(f, "segment plan changed ({})", parts.join(", "))
    }
}

impl std::error::Error for PlanMismatch {}
