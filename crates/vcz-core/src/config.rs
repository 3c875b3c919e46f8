use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Segment length used when the configured value is missing or zero.
pub const DEFAULT_SEGMENT_SECONDS: u64 = 600;

/// Encoding preset: trades encode speed for output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Software x265, slowest, best compression.
    High,
    #[default]
    Standard,
    Low,
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Preset::High),
            "standard" => Ok(Preset::Standard),
            "low" => Ok(Preset::Low),
            other => anyhow::bail!("unknown preset '{}' (expected high, standard or low)", other),
        }
    }
}

/// Global configuration loaded from `~/.config/vcz/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VczConfig {
    /// Maximum number of encoder processes running at once in batch mode.
    pub workers: usize,
    /// Segment length in seconds for single-file segment resume.
    pub segment_seconds: u64,
    /// Split a lone input into resumable segments.
    pub segment_resume: bool,
    /// Encoding preset.
    #[serde(default)]
    pub preset: Preset,
    /// Optional quality override (1-100); higher means better quality.
    #[serde(default)]
    pub quality: Option<u32>,
    /// Hardware decode accelerator passed as `-hwaccel` (None = software decode).
    #[serde(default)]
    pub hwaccel: Option<String>,
    /// Encoder executable.
    pub ffmpeg: String,
    /// Duration probe executable.
    pub ffprobe: String,
}

impl Default for VczConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            segment_seconds: DEFAULT_SEGMENT_SECONDS,
            segment_resume: true,
            preset: Preset::Standard,
            quality: None,
            hwaccel: Some("videotoolbox".to_string()),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl VczConfig {
    /// Segment length with the zero fallback applied.
    pub fn effective_segment_seconds(&self) -> u64 {
        if self.segment_seconds == 0 {
            DEFAULT_SEGMENT_SECONDS
        } else {
            self.segment_seconds
        }
    }

    /// Worker count clamped to at least one.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vcz")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VczConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VczConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VczConfig = toml::from_str(&data)?;
    Ok(cfg)
}
