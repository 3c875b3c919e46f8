//! External process runner.
//!
//! Launches one encoder invocation, reads its machine progress output from
//! stdout, credits forward progress to the shared sink, and kills the child
//! when the run is cancelled. Stderr is captured and attached to failures.

mod progress;

pub use progress::OutTimeTracker;

use std::ffi::{OsStr, OsString};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;

/// Keep at most this much of the child's stderr for diagnostics (tail).
const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// Failure of one external invocation.
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The process ran and exited unsuccessfully.
    #[error("{program} exited with {status}: {}", last_line(.stderr))]
    Exited {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The run was cancelled; the process was killed.
    #[error("cancelled")]
    Cancelled,
    /// Waiting on the process failed.
    #[error("waiting on {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
}

/// Render `program args...` for reports and logs.
pub fn describe_command(program: &OsStr, args: &[OsString]) -> String {
    let mut out = program.to_string_lossy().into_owned();
    for a in args {
        out.push(' ');
        out.push_str(&a.to_string_lossy());
    }
    out
}

/// Run `program args...` to completion, crediting `out_time_us` deltas to `progress`.
///
/// Cancelling `cancel` kills the child and returns `RunError::Cancelled`, also
/// when the child happened to exit on its own first (e.g. it received the
/// same interrupt).
pub async fn run_process(
    program: &OsStr,
    args: &[OsString],
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), RunError> {
    let program_name = program.to_string_lossy().into_owned();
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program_name.clone(),
            source,
        })?;
    tracing::debug!(command = %describe_command(program, args), "spawned encoder");

    let stderr_task = child.stderr.take().map(|s| tokio::spawn(capture_tail(s)));
    let stdout = child.stdout.take();

    let mut tracker = OutTimeTracker::new();
    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).split(b'\n');
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(kill_cancelled(&mut child, stderr_task).await);
                }
                next = lines.next_segment() => match next {
                    Ok(Some(raw)) => {
                        let line = String::from_utf8_lossy(&raw);
                        if let Some(delta) = tracker.observe(&line) {
                            progress.add(delta);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("reading {} stdout: {}", program_name, e);
                        break;
                    }
                },
            }
        }
    }

    let waited = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };
    let status = match waited {
        None => return Err(kill_cancelled(&mut child, stderr_task).await),
        Some(status) => status.map_err(|source| RunError::Io {
            program: program_name.clone(),
            source,
        })?,
    };

    if status.success() {
        if let Some(task) = stderr_task {
            task.abort();
        }
        return Ok(());
    }
    if cancel.is_cancelled() {
        if let Some(task) = stderr_task {
            task.abort();
        }
        return Err(RunError::Cancelled);
    }

    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    tracing::warn!(
        program = %program_name,
        %status,
        "encoder failed; stderr tail:\n{}",
        stderr
    );
    Err(RunError::Exited {
        program: program_name,
        status,
        stderr,
    })
}

async fn kill_cancelled(
    child: &mut Child,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
) -> RunError {
    if let Err(e) = child.kill().await {
        tracing::warn!("killing cancelled encoder: {}", e);
    }
    if let Some(task) = stderr_task {
        task.abort();
    }
    RunError::Cancelled
}

async fn capture_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > STDERR_TAIL_BYTES * 2 {
                    buf.drain(..buf.len() - STDERR_TAIL_BYTES);
                }
            }
        }
    }
    if buf.len() > STDERR_TAIL_BYTES {
        buf.drain(..buf.len() - STDERR_TAIL_BYTES);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
