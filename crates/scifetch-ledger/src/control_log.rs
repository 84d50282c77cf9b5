//! Control log: durable key → status ledger for DOI-list batches
//!
//! Layout (UTF-8, tab separated):
//! ```text
//! Index\tStatus
//! 10.1145/3375633\tOk
//! 10.1000/xyz\tNot available
//! ```
//!
//! Appended to during a run, one synced line per transition. Rewritten
//! in full only by [`ControlLog::rewrite`].

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::record::Status;
use crate::resolve::StatusMap;

/// File name of the control log inside the output root.
pub const CONTROL_LOG_NAME: &str = "summary_control.txt";

const HEADER: &str = "Index\tStatus";

#[derive(Debug, Clone)]
pub struct ControlLog {
    path: PathBuf,
}

impl ControlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the log into a status map, creating it (header only) if missing.
    pub fn load(&self) -> Result<StatusMap> {
        if !self.path.exists() {
            self.write_header()?;
            return Ok(StatusMap::new());
        }
        self.read()
    }

    /// Read the log without creating it. A missing log is an empty map.
    pub fn read(&self) -> Result<StatusMap> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StatusMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to open {}", self.path.display()));
            }
        };

        let mut statuses = StatusMap::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read {}", self.path.display()))?;
            match parse_line(&line) {
                LineKind::Header | LineKind::Blank => {}
                LineKind::Entry(key, status) => {
                    statuses.record(key, status);
                }
                LineKind::Malformed => {
                    log::warn!(
                        "{}:{}: skipping malformed line {line:?}",
                        self.path.display(),
                        line_no + 1
                    );
                }
            }
        }
        Ok(statuses)
    }

    /// Append one entry and sync it to disk before returning.
    pub fn append(&self, key: &str, status: Status) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        // A log deleted mid-run comes back with its header
        if file.metadata()?.len() == 0 {
            writeln!(file, "{HEADER}")?;
        }
        writeln!(file, "{key}\t{status}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("failed to sync {}", self.path.display()))?;
        Ok(())
    }

    /// Replace the log with exactly the entries of `statuses`.
    ///
    /// Written to a `.tmp` sibling and renamed over the log, so a crash
    /// leaves either the old or the new file.
    pub fn rewrite(&self, statuses: &StatusMap) -> Result<()> {
        let tmp_path = self.tmp_path();
        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            writeln!(file, "{HEADER}")?;
            for (key, status) in statuses.iter() {
                writeln!(file, "{key}\t{status}")?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to rename {} → {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{HEADER}\n"))
            .with_context(|| format!("failed to create {}", self.path.display()))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

enum LineKind<'a> {
    Header,
    Blank,
    Entry(&'a str, Status),
    Malformed,
}

fn parse_line(line: &str) -> LineKind<'_> {
    // Keep leading tabs: the empty key (record without DOI) is legal
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with("Index\t") || line == "Index" {
        return LineKind::Header;
    }
    match line.rsplit_once('\t') {
        Some((key, label)) => match label.parse::<Status>() {
            Ok(status) => LineKind::Entry(key, status),
            Err(_) => LineKind::Malformed,
        },
        None => LineKind::Malformed,
    }
}
