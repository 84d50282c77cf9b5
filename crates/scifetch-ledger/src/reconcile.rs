//! Filesystem reconciliation for metadata-mode batches
//!
//! The output tree is the status log: an expected artifact that exists
//! on disk is `Ok`. Reconciliation also prunes what the current batch no
//! longer expects:
//!
//! 1. every expected folder present under the output root is moved into
//!    `{output_root}/.staging/`;
//! 2. each expected file found in its staged folder is moved back into a
//!    fresh real folder and recorded as `Ok`;
//! 3. the staging area is deleted with whatever is left in it.
//!
//! Folders no record names are never touched. Not safe for two runs
//! against one output root at the same time.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::key::{ArtifactKey, metadata_key};
use crate::record::{KeyMode, Record, Status};
use crate::resolve::StatusMap;

/// Staging directory name inside the output root.
pub const STAGING_DIR_NAME: &str = ".staging";

/// Folder (document type) → file names the current batch expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedArtifacts {
    folders: BTreeMap<String, BTreeSet<String>>,
}

impl ExpectedArtifacts {
    pub fn from_records(records: &[Record]) -> Self {
        let mut expected = Self::default();
        for record in records {
            let ak = ArtifactKey::for_record(record, KeyMode::Metadata);
            expected.insert(ak.folder, ak.filename);
        }
        expected
    }

    pub fn insert(&mut self, folder: impl Into<String>, filename: impl Into<String>) {
        self.folders
            .entry(folder.into())
            .or_default()
            .insert(filename.into());
    }

    pub fn folders(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.folders.iter().map(|(f, files)| (f.as_str(), files))
    }

    /// Total number of expected files.
    pub fn file_count(&self) -> usize {
        self.folders.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Stage, restore and prune the output tree; returns `Ok` for every
/// expected artifact found.
///
/// Any I/O failure is fatal for the run.
pub fn reconcile(output_root: &Path, expected: &ExpectedArtifacts) -> Result<StatusMap> {
    let staging = output_root.join(STAGING_DIR_NAME);

    // Leftover from a crashed run
    if staging.exists() {
        log::warn!("Removing stale staging area: {}", staging.display());
        fs::remove_dir_all(&staging)
            .with_context(|| format!("failed to remove {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;

    // 1. Stage expected folders
    for (folder, _) in expected.folders() {
        let real = output_root.join(folder);
        if !real.is_dir() {
            continue;
        }
        let staged = staging.join(folder);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&real, &staged).with_context(|| {
            format!("failed to stage {} → {}", real.display(), staged.display())
        })?;
    }

    // 2. Restore expected files
    let mut statuses = StatusMap::new();
    for (folder, files) in expected.folders() {
        let staged_folder = staging.join(folder);
        if !staged_folder.is_dir() {
            continue;
        }
        let real_folder = output_root.join(folder);
        for filename in files {
            let staged_file = staged_folder.join(filename);
            if !staged_file.is_file() {
                continue;
            }
            fs::create_dir_all(&real_folder)
                .with_context(|| format!("failed to create {}", real_folder.display()))?;
            let restored = real_folder.join(filename);
            fs::rename(&staged_file, &restored).with_context(|| {
                format!(
                    "failed to restore {} → {}",
                    staged_file.display(),
                    restored.display()
                )
            })?;
            statuses.record(&metadata_key(folder, filename), Status::Ok);
        }
    }

    // 3. Drop everything not restored
    let pruned = count_files(&staging);
    if pruned > 0 {
        log::info!("Pruning {pruned} unexpected file(s) from previous runs");
    }
    fs::remove_dir_all(&staging)
        .with_context(|| format!("failed to remove {}", staging.display()))?;

    log::debug!(
        "reconcile: {}/{} expected artifacts present",
        statuses.len(),
        expected.file_count()
    );
    Ok(statuses)
}

/// Read-only variant of [`reconcile`]: reports present artifacts without
/// moving or pruning anything.
pub fn scan(output_root: &Path, expected: &ExpectedArtifacts) -> StatusMap {
    let mut statuses = StatusMap::new();
    for (folder, files) in expected.folders() {
        let real_folder = output_root.join(folder);
        for filename in files {
            if real_folder.join(filename).is_file() {
                statuses.record(&metadata_key(folder, filename), Status::Ok);
            }
        }
    }
    statuses
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| match e.file_type() {
            // Symlinks count as one entry and are not followed
            Ok(ft) if ft.is_dir() => count_files(&e.path()),
            _ => 1,
        })
        .sum()
}
