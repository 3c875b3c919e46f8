//! Encoder command construction.
//!
//! The scheduler only needs argument vectors; codec policy lives here.
//! Segment encodes re-encode audio so the pieces concatenate without gaps,
//! whole-file encodes stream-copy it.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use crate::config::{Preset, VczConfig};
use crate::segmenter::Segment;

/// Builds full argument vectors for the external encoder.
pub trait CommandBuilder: Send + Sync {
    /// Executable to launch.
    fn program(&self) -> &OsStr;

    /// Encode all of `input` into `output`.
    fn encode_args(&self, input: &Path, output: &Path) -> Vec<OsString>;

    /// Encode the time range of `segment` from `input` into `output`.
    fn segment_args(&self, input: &Path, output: &Path, segment: &Segment) -> Vec<OsString>;

    /// Losslessly join the files named in the concat `list` into `output`.
    fn concat_args(&self, list: &Path, output: &Path) -> Vec<OsString>;
}

/// ffmpeg HEVC encoder driven by a preset and optional quality.
#[derive(Debug, Clone)]
pub struct FfmpegCommandBuilder {
    program: OsString,
    preset: Preset,
    quality: Option<u32>,
    hwaccel: Option<String>,
}

impl FfmpegCommandBuilder {
    pub fn from_config(cfg: &VczConfig) -> Self {
        Self {
            program: cfg.ffmpeg.clone().into(),
            preset: cfg.preset,
            quality: cfg.quality.filter(|q| *q > 0),
            hwaccel: cfg.hwaccel.clone().filter(|h| !h.is_empty()),
        }
    }

    fn head(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into()];
        if let Some(hw) = &self.hwaccel {
            args.push("-hwaccel".into());
            args.push(hw.into());
        }
        args
    }

    fn common_output_flags(args: &mut Vec<OsString>) {
        for a in [
            "-progress",
            "pipe:1",
            "-nostats",
            "-hide_banner",
            "-map_metadata",
            "0",
            "-movflags",
            "+faststart",
            "-ignore_unknown",
            "-err_detect",
            "ignore_err",
        ] {
            args.push(a.into());
        }
    }

    fn video_flags(&self, args: &mut Vec<OsString>) {
        match self.preset {
            Preset::High => {
                let crf = match self.quality {
                    Some(q) => 51u32.saturating_sub(q / 2),
                    None => 24,
                };
                push_all(
                    args,
                    &[
                        "-c:v",
                        "libx265",
                        "-crf",
                        &crf.to_string(),
                        "-preset",
                        "medium",
                        "-vf",
                        "format=yuv420p",
                        "-tag:v",
                        "hvc1",
                    ],
                );
            }
            Preset::Standard | Preset::Low => {
                let q = match (self.quality, self.preset) {
                    (Some(q), _) => q,
                    (None, Preset::Low) => 40,
                    (None, _) => 50,
                };
                push_all(
                    args,
                    &[
                        "-c:v",
                        "hevc_videotoolbox",
                        "-q:v",
                        &q.to_string(),
                        "-profile:v",
                        "main10",
                        "-tag:v",
                        "hvc1",
                        "-pix_fmt",
                        "p010le",
                    ],
                );
            }
        }
    }
}

fn push_all(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

impl CommandBuilder for FfmpegCommandBuilder {
    fn program(&self) -> &OsStr {
        &self.program
    }

    fn encode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args = self.head();
        args.push("-i".into());
        args.push(input.into());
        Self::common_output_flags(&mut args);
        self.video_flags(&mut args);
        push_all(&mut args, &["-c:a", "copy"]);
        args.push(output.into());
        args
    }

    fn segment_args(&self, input: &Path, output: &Path, segment: &Segment) -> Vec<OsString> {
        let mut args = self.head();
        args.push("-ss".into());
        args.push(format!("{:.3}", segment.start_secs).into());
        args.push("-t".into());
        args.push(format!("{:.3}", segment.duration_secs).into());
        args.push("-i".into());
        args.push(input.into());
        Self::common_output_flags(&mut args);
        self.video_flags(&mut args);
        push_all(&mut args, &["-c:a", "aac", "-b:a", "160k"]);
        args.push(output.into());
        args
    }

    fn concat_args(&self, list: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        push_all(&mut args, &["-y", "-f", "concat", "-safe", "0", "-i"]);
        args.push(list.into());
        push_all(&mut args, &["-c", "copy", "-movflags", "+faststart"]);
        args.push(output.into());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn standard_preset_copies_audio() {
        let b = FfmpegCommandBuilder::from_config(&VczConfig::default());
        let args = strs(&b.encode_args(Path::new("in.mp4"), Path::new("out.mp4.part")));
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(value_after(&args, "-hwaccel").as_deref(), Some("videotoolbox"));
        assert_eq!(value_after(&args, "-progress").as_deref(), Some("pipe:1"));
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("hevc_videotoolbox"));
        assert_eq!(value_after(&args, "-q:v").as_deref(), Some("50"));
        assert_eq!(value_after(&args, "-c:a").as_deref(), Some("copy"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4.part"));
    }

    #[test]
    fn high_preset_maps_quality_to_crf() {
        let cfg = VczConfig {
            preset: Preset::High,
            quality: Some(60),
            hwaccel: None,
            ..VczConfig::default()
        };
        let b = FfmpegCommandBuilder::from_config(&cfg);
        let args = strs(&b.encode_args(Path::new("a.mkv"), Path::new("b.mkv")));
        assert!(!args.contains(&"-hwaccel".to_string()));
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("libx265"));
        assert_eq!(value_after(&args, "-crf").as_deref(), Some("21"));
    }

    #[test]
    fn low_preset_default_quality() {
        let cfg = VczConfig {
            preset: Preset::Low,
            ..VczConfig::default()
        };
        let b = FfmpegCommandBuilder::from_config(&cfg);
        let args = strs(&b.encode_args(Path::new("a.mov"), Path::new("b.mov")));
        assert_eq!(value_after(&args, "-q:v").as_deref(), Some("40"));
    }

    #[test]
    fn segment_reencodes_audio_and_seeks() {
        let b = FfmpegCommandBuilder::from_config(&VczConfig::default());
        let seg = Segment {
            index: 2,
            start_secs: 1200.0,
            duration_secs: 45.5,
        };
        let args = strs(&b.segment_args(Path::new("in.mp4"), Path::new("seg.mp4"), &seg));
        assert_eq!(value_after(&args, "-ss").as_deref(), Some("1200.000"));
        assert_eq!(value_after(&args, "-t").as_deref(), Some("45.500"));
        assert_eq!(value_after(&args, "-c:a").as_deref(), Some("aac"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i, "seek must be an input option");
    }

    #[test]
    fn concat_is_stream_copy() {
        let b = FfmpegCommandBuilder::from_config(&VczConfig::default());
        let args = strs(&b.concat_args(Path::new("list.txt"), Path::new("out.mp4")));
        assert_eq!(value_after(&args, "-f").as_deref(), Some("concat"));
        assert_eq!(value_after(&args, "-c").as_deref(), Some("copy"));
        assert!(!args.contains(&"-progress".to_string()));
    }
}
