//! Stand-in encoder and probe so scheduler tests run without ffmpeg.
//!
//! "Media" files are text: each line holding a number is that many seconds
//! of content. Encoding copies the input (or writes the segment length),
//! concatenation appends the listed files, and the probe sums the numbers,
//! so durations survive every step just like real media would.
//!
//! Inputs whose name contains `fail` make the encoder exit 3; names
//! containing `hang` make it write part of the output and then block until
//! killed. Every invocation is appended to a log for counting.

#![allow(dead_code)]

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vcz_core::checkpoint::{CheckpointStore, CHECKPOINT_FILE_NAME};
use vcz_core::encoder::CommandBuilder;
use vcz_core::probe::{DurationProbe, ProbeError};
use vcz_core::progress::ProgressSink;
use vcz_core::scheduler::{Scheduler, SchedulerSettings};
use vcz_core::segmenter::Segment;

const SCRIPT: &str = r#"
mode="$1"; log="$2"; shift 2
printf '%s %s\n' "$mode" "$*" >> "$log"
progress() {
  us=$(( $1 * 1000000 ))
  half=$(( us / 2 ))
  echo "frame=1"
  echo "out_time_us=$half"
  echo "progress=continue"
  echo "out_time_us=N/A"
  echo "out_time_us=$half"
  echo "out_time_us=$us"
  echo "progress=end"
}
case "$mode" in
  encode)
    dur=$(head -n 1 "$1")
    cp "$1" "$2"
    progress "$dur"
    ;;
  segment)
    printf '%s\n' "$3" > "$2"
    progress "$3"
    ;;
  concat)
    : > "$2"
    sed -n "s/^file '\(.*\)'\$/\1/p" "$1" | while IFS= read -r f; do cat "$f" >> "$2"; done
    ;;
  fail)
    echo "simulated encoder failure" >&2
    exit 3
    ;;
  hang)
    printf 'partial\n' > "$2"
    echo "out_time_us=1000000"
    exec sleep 30
    ;;
esac
"#;

/// `sh`-backed `CommandBuilder`.
#[derive(Debug, Clone)]
pub struct FakeEncoder {
    log: PathBuf,
    /// Segments with this index or above fail.
    pub fail_from_segment: Option<usize>,
}

impl FakeEncoder {
    pub fn new(log: impl Into<PathBuf>) -> Self {
        Self {
            log: log.into(),
            fail_from_segment: None,
        }
    }

    fn invoke(&self, mode: &str, rest: &[&OsStr]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            SCRIPT.into(),
            "fake-encoder".into(),
            mode.into(),
            self.log.clone().into_os_string(),
        ];
        args.extend(rest.iter().map(|a| a.to_os_string()));
        args
    }
}

fn mode_for(input: &Path, normal: &'static str) -> &'static str {
    let name = input.file_name().unwrap().to_string_lossy();
    if name.contains("fail") {
        "fail"
    } else if name.contains("hang") {
        "hang"
    } else {
        normal
    }
}

impl CommandBuilder for FakeEncoder {
    fn program(&self) -> &OsStr {
        OsStr::new("sh")
    }

    fn encode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        self.invoke(
            mode_for(input, "encode"),
            &[input.as_os_str(), output.as_os_str()],
        )
    }

    fn segment_args(&self, input: &Path, output: &Path, segment: &Segment) -> Vec<OsString> {
        let mut mode = mode_for(input, "segment");
        if self
            .fail_from_segment
            .is_some_and(|from| segment.index >= from)
        {
            mode = "fail";
        }
        let secs = OsString::from(format!("{}", segment.duration_secs.round() as u64));
        let index = OsString::from(segment.index.to_string());
        self.invoke(
            mode,
            &[
                input.as_os_str(),
                output.as_os_str(),
                secs.as_os_str(),
                index.as_os_str(),
            ],
        )
    }

    fn concat_args(&self, list: &Path, output: &Path) -> Vec<OsString> {
        self.invoke("concat", &[list.as_os_str(), output.as_os_str()])
    }
}

/// Probe summing the numeric lines of a file.
#[derive(Debug, Default)]
pub struct FakeProbe;

impl DurationProbe for FakeProbe {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let text = std::fs::read_to_string(path).map_err(ProbeError::Spawn)?;
        let numbers: Vec<f64> = text
            .lines()
            .filter_map(|l| l.trim().parse::<f64>().ok())
            .collect();
        if numbers.is_empty() {
            return Err(ProbeError::Parse(text));
        }
        Ok(numbers.iter().sum())
    }
}

/// A scratch directory holding inputs, the checkpoint file and the encoder log.
pub struct Harness {
    _dir: tempfile::TempDir,
    pub root: PathBuf,
    pub log: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        let log = root.join("encoder.log");
        Self {
            _dir: dir,
            root,
            log,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE_NAME)
    }

    /// Fresh view of the on-disk checkpoint store.
    pub fn store(&self) -> Arc<CheckpointStore> {
        Arc::new(CheckpointStore::load(self.store_path()).unwrap())
    }

    /// Write an input holding `secs` seconds of media.
    pub fn input(&self, name: &str, secs: u64) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, format!("{}\n", secs)).unwrap();
        path
    }

    pub fn encoder(&self) -> FakeEncoder {
        FakeEncoder::new(&self.log)
    }

    pub fn scheduler(
        &self,
        settings: SchedulerSettings,
        encoder: FakeEncoder,
        progress: Arc<dyn ProgressSink>,
    ) -> Scheduler {
        Scheduler::new(
            settings,
            self.store(),
            Arc::new(encoder),
            Arc::new(FakeProbe),
            progress,
        )
    }

    /// Logged invocations of `mode`, one entry per call.
    pub fn invocations(&self, mode: &str) -> Vec<String> {
        let Ok(text) = std::fs::read_to_string(&self.log) else {
            return Vec::new();
        };
        let prefix = format!("{} ", mode);
        text.lines()
            .filter(|l| l.starts_with(&prefix))
            .map(str::to_string)
            .collect()
    }
}

pub fn batch_settings(workers: usize) -> SchedulerSettings {
    SchedulerSettings {
        workers,
        segment_seconds: 600,
        segment_resume: false,
    }
}

pub fn segment_settings(segment_seconds: u64) -> SchedulerSettings {
    SchedulerSettings {
        workers: 1,
        segment_seconds,
        segment_resume: true,
    }
}

pub fn overwrite_all(_: &Path) -> bool {
    true
}
