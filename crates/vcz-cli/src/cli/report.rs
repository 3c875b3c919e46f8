//! Final per-file report.

use vcz_core::encoder::CommandBuilder;
use vcz_core::runner::describe_command;
use vcz_core::scheduler::{reduction_percent, Job, JobResult, JobStatus, SkippedItem, Summary};

pub fn print_report(results: &[JobResult], skipped: &[SkippedItem]) {
    println!();
    for line in report_lines(results, skipped) {
        println!("{}", line);
    }
}

/// Report body: one entry per job, then skips, then the summary line.
pub fn report_lines(results: &[JobResult], skipped: &[SkippedItem]) -> Vec<String> {
    let mut lines = vec!["Report".to_string()];
    for r in results {
        match r.status {
            JobStatus::Processed => {
                lines.push(format!(
                    "  ok       {}  {} -> {} ({:.1}% smaller)",
                    r.display_name(),
                    format_size(r.original_size),
                    format_size(r.new_size),
                    reduction_percent(r.original_size, r.new_size)
                ));
                lines.push(format!("           command: {}", r.command));
            }
            JobStatus::Failed => lines.push(format!(
                "  failed   {}  {}",
                r.display_name(),
                r.reason.as_deref().unwrap_or("unknown error")
            )),
            JobStatus::Cancelled => lines.push(format!("  stopped  {}", r.display_name())),
        }
    }
    for s in skipped {
        let name = s
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| s.input_path.display().to_string());
        lines.push(format!("  skipped  {}  {}", name, s.reason));
    }

    let summary = Summary::from_results(results, skipped);
    lines.push(summary_line(&summary));
    lines
}

pub fn summary_line(s: &Summary) -> String {
    let mut line = format!(
        "{} total: {} processed, {} failed, {} skipped",
        s.total, s.processed, s.failed, s.skipped
    );
    if s.cancelled > 0 {
        line.push_str(&format!(", {} cancelled", s.cancelled));
    }
    if s.processed > 0 {
        let saved = s.saved_bytes();
        let change = if saved >= 0 {
            format!("saved {}", format_size(saved.unsigned_abs()))
        } else {
            format!("grew {}", format_size(saved.unsigned_abs()))
        };
        line.push_str(&format!(
            "; {} -> {} ({})",
            format_size(s.original_bytes),
            format_size(s.new_bytes),
            change
        ));
    }
    line
}

/// Whole-file command line that would encode `job`.
pub fn command_preview(builder: &dyn CommandBuilder, job: &Job) -> String {
    let args = builder.encode_args(&job.input_path, &job.temp_path);
    describe_command(builder.program(), &args)
}

/// Human-readable byte size (binary units).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// `H:MM:SS` for a number of seconds.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
