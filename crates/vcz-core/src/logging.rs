//! Log setup for the `vcz` binary.
//!
//! While a batch runs, stderr carries the redrawn progress line and the
//! overwrite prompts, so events go to `~/.local/state/vcz/vcz.log` instead.
//! Encoder command lines and per-segment decisions are logged at debug and
//! only show up there. When the state dir cannot be used the CLI falls back
//! to stderr at `warn`, which stays quiet enough not to tear the progress line.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter for the log file when `RUST_LOG` is unset.
const FILE_FILTER: &str = "info,vcz_core=debug,vcz=debug";
/// Filter for the stderr fallback when `RUST_LOG` is unset.
const STDERR_FILTER: &str = "warn";

/// Per-event writer. A handle that cannot be cloned sends that event to stderr.
enum LogSink {
    File(File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

/// Shared append handle to the log file.
struct LogFile(File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// `~/.local/state/vcz/vcz.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vcz")?;
    Ok(xdg_dirs.get_state_home().join("vcz.log"))
}

/// Open `path` for appending, creating its directory first.
fn open_log(path: &std::path::Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

/// Send events to the vcz log file. An error leaves no subscriber installed,
/// so the caller can still use [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    let file = open_log(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter_or(FILE_FILTER))
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!(pid = std::process::id(), "vcz started, logging to {}", path.display());
    Ok(())
}

/// Warnings and errors to stderr only.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(STDERR_FILTER))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
