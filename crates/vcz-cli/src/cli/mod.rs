//! CLI for the VCZ batch video compressor.

mod commands;
mod progress_bar;
mod prompt;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vcz_core::config;

use commands::{run_compress, run_status, CompressOptions};

/// Top-level CLI for the VCZ compressor.
#[derive(Debug, Parser)]
#[command(name = "vcz")]
#[command(about = "VCZ: resumable batch video compressor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Compress a video file or every video under a directory.
    Compress {
        /// Input file or directory.
        input: PathBuf,

        /// Write outputs here instead of beside the inputs.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Encoding preset: high, standard or low.
        #[arg(short, long)]
        preset: Option<String>,

        /// Quality 1-100 (higher is better); overrides the preset default.
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=100))]
        quality: Option<u32>,

        /// Encoder processes to run at once in batch mode.
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        /// Segment length in seconds when a single file is split for resume.
        #[arg(long, value_name = "N")]
        segment_seconds: Option<u64>,

        /// Encode a lone input in one piece instead of resumable segments.
        #[arg(long)]
        disable_segment_resume: bool,

        /// Overwrite existing outputs without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show checkpoint records for an input and whether each is still valid.
    Status {
        /// Input file or directory that was compressed.
        input: PathBuf,

        /// Output directory used for the compression run, if any.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Compress {
                input,
                output,
                preset,
                quality,
                workers,
                segment_seconds,
                disable_segment_resume,
                yes,
            } => {
                let opts = CompressOptions {
                    input,
                    output,
                    preset,
                    quality,
                    workers,
                    segment_seconds,
                    disable_segment_resume,
                    yes,
                };
                run_compress(cfg, opts).await?;
            }
            CliCommand::Status { input, output } => run_status(&input, output.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
