//! Engine configuration, built once at startup and passed by reference

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::control_log::CONTROL_LOG_NAME;

/// Summary artifact file names inside the output root.
pub const SUMMARY_FILE_NAME: &str = "summary_download.csv";
pub const SUMMARY_XLSX_NAME: &str = "summary_download.xlsx";

/// External fetch command settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Program to run
    pub command: String,
    /// Arguments; `{doi}` and `{out}` are substituted per record
    pub args: Vec<String>,
    /// Upper bound on one fetch; the child is killed past it
    pub timeout: Duration,
    /// One output line must contain all of these (empty = exit code only)
    pub success_markers: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            command: "scidownl".to_string(),
            args: ["download", "--doi", "{doi}", "--out", "{out}"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout: Duration::from_secs(300),
            success_markers: vec!["Successfully".to_string(), "download".to_string()],
        }
    }
}

/// Runtime configuration for the download engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the output tree (artifacts, control log, summary)
    pub output_root: PathBuf,
    pub fetch: FetchSettings,
    /// Run the PDF metadata check on every fetched file
    pub verify_pdf: bool,
    /// Rewrite the control log from the final status map after a DOI run
    pub compact_control_log: bool,
}

impl EngineConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            fetch: FetchSettings::default(),
            verify_pdf: true,
            compact_control_log: true,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn control_log_path(&self) -> PathBuf {
        self.output_root.join(CONTROL_LOG_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_root.join(SUMMARY_FILE_NAME)
    }

    pub fn summary_xlsx_path(&self) -> PathBuf {
        self.output_root.join(SUMMARY_XLSX_NAME)
    }
}
