//! Fetch collaborator boundary and the fetch-and-verify step
//!
//! The engine never downloads anything itself. A [`Fetcher`] is handed a
//! DOI and a target path and blocks until it has written the file or
//! failed; [`fetch_and_verify`] turns that into a [`FetchOutcome`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use scifetch_core::SHARED_RUNTIME;

use crate::config::FetchSettings;
use crate::integrity::{self, IntegrityError};

/// Output lines kept in an exit-failure message
const ERROR_TAIL_LINES: usize = 5;

/// Retrieves the artifact for a DOI into a target path.
pub trait Fetcher {
    /// Block until `target` is written or the attempt failed.
    fn fetch(&self, doi: &str, target: &Path) -> Result<(), FetchError>;
}

/// Error from one fetch attempt
#[derive(Debug)]
pub enum FetchError {
    /// Command could not be started
    Spawn(io::Error),
    /// Command exceeded its time budget and was killed
    Timeout(Duration),
    /// Command exited unsuccessfully
    Exit { code: Option<i32>, output: String },
    /// Command exited 0 but never reported success
    NoSuccessMarker,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to start fetch command: {e}"),
            Self::Timeout(d) => write!(f, "fetch timed out after {}s", d.as_secs()),
            Self::Exit {
                code: Some(code),
                output,
            } => write!(f, "fetch exited with code {code}: {output}"),
            Self::Exit { code: None, output } => {
                write!(f, "fetch terminated by signal: {output}")
            }
            Self::NoSuccessMarker => write!(f, "fetch did not report success"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Why a record's artifact could not be obtained this run.
#[derive(Debug)]
pub enum FailureReason {
    /// Target folder could not be prepared
    Prepare(io::Error),
    Fetch(FetchError),
    /// Fetch reported success but left no file behind
    MissingOutput,
    /// File failed the integrity check and was deleted
    Corrupt(IntegrityError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare(e) => write!(f, "cannot prepare output folder: {e}"),
            Self::Fetch(e) => write!(f, "{e}"),
            Self::MissingOutput => write!(f, "no file produced"),
            Self::Corrupt(e) => write!(f, "corrupt download ({e})"),
        }
    }
}

/// Result of the fetch-and-verify step.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Artifact written and verified
    Fetched(PathBuf),
    Failed(FailureReason),
}

/// Fetch `doi` into `target`, then verify it.
///
/// On failure nothing is left at `target`: a stray file there would be
/// taken for a finished download by the next reconciliation.
pub fn fetch_and_verify(
    fetcher: &dyn Fetcher,
    doi: &str,
    target: &Path,
    verify: bool,
) -> FetchOutcome {
    if let Some(parent) = target.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return FetchOutcome::Failed(FailureReason::Prepare(e));
        }
    }

    if let Err(e) = fetcher.fetch(doi, target) {
        discard(target);
        return FetchOutcome::Failed(FailureReason::Fetch(e));
    }

    if !target.is_file() {
        return FetchOutcome::Failed(FailureReason::MissingOutput);
    }

    if verify {
        if let Err(e) = integrity::verify_pdf(target) {
            discard(target);
            return FetchOutcome::Failed(FailureReason::Corrupt(e));
        }
    }

    FetchOutcome::Fetched(target.to_path_buf())
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove partial download {}: {e}", path.display());
        }
    }
}

/// Runs an external command per DOI (scidownl by default).
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    settings: FetchSettings,
}

impl CommandFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    /// Expand `{doi}` and `{out}` placeholders.
    fn build_args(&self, doi: &str, target: &Path) -> Vec<String> {
        let out = target.to_string_lossy();
        self.settings
            .args
            .iter()
            .map(|arg| arg.replace("{doi}", doi).replace("{out}", &out))
            .collect()
    }

    fn reports_success(&self, output: &str) -> bool {
        let markers = &self.settings.success_markers;
        markers.is_empty()
            || output
                .lines()
                .any(|line| markers.iter().all(|m| line.contains(m.as_str())))
    }
}

impl Fetcher for CommandFetcher {
    fn fetch(&self, doi: &str, target: &Path) -> Result<(), FetchError> {
        let args = self.build_args(doi, target);
        log::debug!("exec: {} {}", self.settings.command, args.join(" "));

        let mut cmd = tokio::process::Command::new(&self.settings.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.settings.timeout;
        let output = SHARED_RUNTIME
            .block_on(async { tokio::time::timeout(timeout, cmd.output()).await })
            .map_err(|_| FetchError::Timeout(timeout))?
            .map_err(FetchError::Spawn)?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("{}: {line}", self.settings.command);
        }

        if !output.status.success() {
            let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            let tail = lines[lines.len().saturating_sub(ERROR_TAIL_LINES)..].join(" | ");
            return Err(FetchError::Exit {
                code: output.status.code(),
                output: tail,
            });
        }
        if !self.reports_success(&text) {
            return Err(FetchError::NoSuccessMarker);
        }
        Ok(())
    }
}
