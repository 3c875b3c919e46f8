//! `vcz compress` – discover inputs, encode them, print the report.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vcz_core::checkpoint::{self, CheckpointStore};
use vcz_core::config::{Preset, VczConfig};
use vcz_core::control::RunControl;
use vcz_core::encoder::FfmpegCommandBuilder;
use vcz_core::probe::FfprobeDuration;
use vcz_core::progress::NullProgress;
use vcz_core::scan;
use vcz_core::scheduler::{OverwriteDecider, Scheduler, SchedulerSettings, Summary};

use crate::cli::progress_bar::TerminalProgress;
use crate::cli::{prompt, report};

/// Flags of one `compress` invocation; `None` keeps the config value.
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub preset: Option<String>,
    pub quality: Option<u32>,
    pub workers: Option<usize>,
    pub segment_seconds: Option<u64>,
    pub disable_segment_resume: bool,
    pub yes: bool,
}

impl CompressOptions {
    /// Layer these flags over `cfg`.
    pub fn apply(&self, mut cfg: VczConfig) -> Result<VczConfig> {
        if let Some(p) = &self.preset {
            cfg.preset = p.parse::<Preset>()?;
        }
        if self.quality.is_some() {
            cfg.quality = self.quality;
        }
        if let Some(w) = self.workers {
            cfg.workers = w;
        }
        if let Some(s) = self.segment_seconds {
            cfg.segment_seconds = s;
        }
        if self.disable_segment_resume {
            cfg.segment_resume = false;
        }
        Ok(cfg)
    }
}

pub async fn run_compress(cfg: VczConfig, opts: CompressOptions) -> Result<()> {
    let cfg = opts.apply(cfg)?;
    let candidates = scan::collect_candidates(&opts.input)?;
    if candidates.is_empty() {
        println!("No video files found under {}.", opts.input.display());
        return Ok(());
    }

    let output_dir = match &opts.output {
        Some(dir) => Some(prepare_output_dir(dir)?),
        None => None,
    };
    let store_path = checkpoint::default_path(&opts.input, output_dir.as_deref());
    let store = CheckpointStore::load(&store_path)
        .with_context(|| format!("load checkpoint {}", store_path.display()))?;

    let builder = Arc::new(FfmpegCommandBuilder::from_config(&cfg));
    let mut scheduler = Scheduler::new(
        SchedulerSettings::from_config(&cfg),
        Arc::new(store),
        builder.clone(),
        Arc::new(FfprobeDuration::new(&cfg.ffprobe)),
        Arc::new(NullProgress),
    );

    let assume_yes = opts.yes;
    let decider = move |output: &Path| assume_yes || prompt::ask_overwrite(output);
    let discovery = scheduler
        .discover(&candidates, output_dir.as_deref(), &decider as &dyn OverwriteDecider)
        .await;

    if discovery.jobs.is_empty() {
        println!("Nothing to do.");
        report::print_report(&[], &discovery.skipped);
        return Ok(());
    }

    let mode = if scheduler.uses_segment_mode(&discovery.jobs) {
        format!("segment mode, {}s segments", scheduler.settings().segment_seconds)
    } else {
        format!(
            "batch mode, {} worker(s)",
            scheduler.settings().workers.min(discovery.jobs.len())
        )
    };
    println!(
        "Compressing {} file(s), {} of media ({}).",
        discovery.jobs.len(),
        report::format_duration(discovery.total_duration_secs),
        mode
    );
    if let Some(first) = discovery.jobs.first() {
        println!("Command: {}", report::command_preview(builder.as_ref(), first));
    }

    let display = Arc::new(TerminalProgress::new(discovery.total_progress_units()));
    scheduler.set_progress(display.clone());
    let ticker = display.spawn_ticker();

    let control = RunControl::new();
    let signal_task = control.cancel_on_signal({
        let display = Arc::clone(&display);
        move || display.announce("interrupt received, stopping encoders...")
    });

    let results = scheduler.run(discovery.jobs, &control.token()).await;

    display.finish();
    let _ = ticker.await;
    signal_task.abort();

    report::print_report(&results, &discovery.skipped);
    let summary = Summary::from_results(&results, &discovery.skipped);
    if !summary.is_clean() {
        anyhow::bail!("{} of {} file(s) failed", summary.failed, summary.total);
    }
    Ok(())
}

/// Create the output directory and return its absolute path.
fn prepare_output_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))?;
    std::fs::canonicalize(dir).with_context(|| format!("resolve {}", dir.display()))
}
