//! Media duration probe.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start probe: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("probe failed: {0}")]
    Failed(String),
    #[error("unparsable duration '{0}'")]
    Parse(String),
}

/// Returns the playable duration of a media file in seconds.
pub trait DurationProbe: Send + Sync {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// `ffprobe`-backed probe.
#[derive(Debug, Clone)]
pub struct FfprobeDuration {
    program: OsString,
}

impl FfprobeDuration {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeDuration {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl DurationProbe for FfprobeDuration {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let out = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(ProbeError::Spawn)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let msg = stderr.trim();
            return Err(ProbeError::Failed(if msg.is_empty() {
                format!("exit {}", out.status)
            } else {
                msg.to_string()
            }));
        }
        parse_duration(&String::from_utf8_lossy(&out.stdout))
    }
}

/// Parse ffprobe's bare `format=duration` output.
pub fn parse_duration(raw: &str) -> Result<f64, ProbeError> {
    let s = raw.trim();
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ProbeError::Parse(s.to_string())),
    }
}
