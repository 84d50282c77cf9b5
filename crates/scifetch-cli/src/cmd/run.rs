//! `scifetch run` - fetch every paper of an input file not yet on disk

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use scifetch_core::SharedProgress;
use scifetch_ledger::{CommandFetcher, EngineConfig, read_batch};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input file: repository export (.xlsx/.csv) or DOI list (.txt/.tsv)
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seconds before a single fetch is killed
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fetch command to run instead of the configured one
    #[arg(long)]
    pub fetch_command: Option<String>,

    /// Accept downloads without checking they are readable PDFs
    #[arg(long)]
    pub no_verify: bool,

    /// Keep the control log append-only (skip end-of-run rewrite)
    #[arg(long)]
    pub no_compact: bool,
}

impl RunArgs {
    pub fn output_root(&self, config: &Config) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| config.output.default_dir.clone())
    }

    /// Config file values with CLI overrides applied.
    fn engine_config(&self, config: &Config) -> EngineConfig {
        let mut engine = config.engine(self.output_root(config));
        if let Some(secs) = self.timeout {
            engine.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(command) = &self.fetch_command {
            engine.fetch.command = command.clone();
        }
        if self.no_verify {
            engine.verify_pdf = false;
        }
        if self.no_compact {
            engine.compact_control_log = false;
        }
        engine
    }
}

/// Per-day run log inside the output root.
pub fn run_log_path(output_root: &Path) -> PathBuf {
    let day = chrono::Local::now().format("%Y%m%d");
    output_root.join(format!("run_scifetch_{day}.log"))
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let engine = args.engine_config(config);

    let command = which::which(&engine.fetch.command).with_context(|| {
        format!(
            "fetch command '{}' not found (set [fetch] command or --fetch-command)",
            engine.fetch.command
        )
    })?;
    log::debug!("fetch command: {}", command.display());

    let batch = read_batch(&args.input)
        .with_context(|| format!("failed to read input {}", args.input.display()))?;
    log::info!(
        "Input {}: {} records ({})",
        args.input.display(),
        batch.len(),
        batch.layout
    );

    let fetcher = CommandFetcher::new(engine.fetch.clone());
    let summary = scifetch_ledger::run(&engine, &batch, &fetcher, progress)?;

    if progress.is_tty() {
        summary.print();
    }
    summary.log();
    log::info!(
        "Summary written to {} and {}",
        engine.summary_path().display(),
        engine.summary_xlsx_path().display()
    );

    if summary.interrupted {
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
