//! Run driver: seed statuses, walk the batch, report

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use scifetch_core::{ProgressContext, fmt_num, is_shutdown_requested};

use crate::config::EngineConfig;
use crate::control_log::ControlLog;
use crate::fetch::Fetcher;
use crate::input::Batch;
use crate::orchestrator::Orchestrator;
use crate::reconcile::{self, ExpectedArtifacts};
use crate::record::{KeyMode, Status};
use crate::resolve::{self, StatusMap};
use crate::summary::Summary;

/// Seed the status map for a batch.
///
/// Metadata mode reconciles the output tree (pruning orphans); DOI mode
/// loads the control log, creating it if missing. The log is returned so
/// the caller can append to it.
pub fn load_statuses(
    config: &EngineConfig,
    batch: &Batch,
) -> Result<(StatusMap, Option<ControlLog>)> {
    match batch.layout.key_mode() {
        KeyMode::Metadata => {
            let expected = ExpectedArtifacts::from_records(&batch.records);
            let statuses = reconcile::reconcile(config.output_root(), &expected)
                .context("Failed to reconcile output directory")?;
            Ok((statuses, None))
        }
        KeyMode::Doi => {
            let control_log = ControlLog::new(config.control_log_path());
            let statuses = control_log.load().with_context(|| {
                format!(
                    "Failed to load control log {}",
                    control_log.path().display()
                )
            })?;
            Ok((statuses, Some(control_log)))
        }
    }
}

/// Process every record of `batch`, then write the summary artifact.
///
/// Stops between records once a shutdown is requested; records not
/// reached stay unknown and are picked up by the next run.
pub fn run(
    config: &EngineConfig,
    batch: &Batch,
    fetcher: &dyn Fetcher,
    progress: &ProgressContext,
) -> Result<Summary> {
    let started = Instant::now();
    let mode = batch.layout.key_mode();
    let total = batch.len();

    fs::create_dir_all(config.output_root()).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.output_root().display()
        )
    })?;
    log::info!(
        "scifetch starting: layout={}, records={}, output={}",
        batch.layout,
        fmt_num(total),
        config.output_root().display()
    );

    let (mut statuses, control_log) = load_statuses(config, batch)?;
    log::info!(
        "Known statuses: {} ok, {} not available, {} non-existent",
        fmt_num(statuses.count(Status::Ok)),
        fmt_num(statuses.count(Status::NotAvailable)),
        fmt_num(statuses.count(Status::Nonexistent))
    );

    let orchestrator = Orchestrator::new(config, mode, fetcher, control_log.as_ref());
    let mut summary = Summary::new(batch.layout, total);
    let pb = progress.batch_line("papers", total);

    for (i, record) in batch.records.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before record {}", i + 1);
            summary.interrupted = true;
            break;
        }
        let label = record.label(mode);
        pb.set_message(label.to_string());
        log::info!("[{}/{}] Analyzing the Paper: {label}", i + 1, total);

        let outcome = orchestrator.process(record, &mut statuses)?;
        summary.push(record, &outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Some(control_log) = &control_log {
        if config.compact_control_log {
            control_log
                .rewrite(&statuses)
                .context("Failed to compact control log")?;
        }
    }

    summary.elapsed = started.elapsed();
    summary
        .write_csv(&config.summary_path())
        .context("Failed to write download summary")?;
    summary
        .write_xlsx(&config.summary_xlsx_path())
        .context("Failed to write download summary workbook")?;
    Ok(summary)
}

/// Read-only view of where a batch stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub total: usize,
    pub ok: usize,
    pub not_available: usize,
    pub non_existent: usize,
    /// Never attempted, or attempted but file since removed
    pub pending: usize,
}

impl Plan {
    /// Records the next run would hand to the fetcher.
    pub fn to_fetch(&self) -> usize {
        self.pending + self.not_available
    }
}

/// Resolve every record without touching the output tree or the log.
///
/// A pending record without a DOI is counted as pending: it turns
/// `Nonexistent` only once a run visits it.
pub fn plan(config: &EngineConfig, batch: &Batch) -> Result<Plan> {
    let mode = batch.layout.key_mode();
    let statuses = match mode {
        KeyMode::Metadata => {
            let expected = ExpectedArtifacts::from_records(&batch.records);
            reconcile::scan(config.output_root(), &expected)
        }
        KeyMode::Doi => ControlLog::new(config.control_log_path()).read()?,
    };

    let mut plan = Plan {
        total: batch.len(),
        ..Default::default()
    };
    for record in &batch.records {
        match resolve::resolve(record, mode, &statuses) {
            Some(Status::Ok) => plan.ok += 1,
            Some(Status::NotAvailable) => plan.not_available += 1,
            Some(Status::Nonexistent) => plan.non_existent += 1,
            None => plan.pending += 1,
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{InputLayout, Record};
    use tempfile::TempDir;

    fn doi_batch(dois: &[Option<&str>]) -> Batch {
        Batch {
            layout: InputLayout::DoiList,
            records: dois
                .iter()
                .enumerate()
                .map(|(i, doi)| Record {
                    index: i + 1,
                    doi: doi.map(String::from),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn doi_mode_creates_control_log() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path());
        let (statuses, log) = load_statuses(&config, &doi_batch(&[Some("10.1/a")])).unwrap();
        assert!(statuses.is_empty());
        assert!(log.is_some());
        assert!(config.control_log_path().is_file());
    }

    #[test]
    fn plan_is_read_only() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path());
        let log = ControlLog::new(config.control_log_path());
        log.append("10.1/a", Status::Ok).unwrap();
        log.append("10.1/b", Status::NotAvailable).unwrap();

        let batch = doi_batch(&[Some("10.1/a"), Some("10.1/b"), Some("10.1/c"), None]);
        let plan = plan(&config, &batch).unwrap();

        assert_eq!(
            plan,
            Plan {
                total: 4,
                ok: 1,
                not_available: 1,
                non_existent: 0,
                pending: 2,
            }
        );
        assert_eq!(plan.to_fetch(), 3);
        assert!(!config.summary_path().exists());
    }

    #[test]
    fn plan_without_control_log() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("never-run"));
        let plan = plan(&config, &doi_batch(&[Some("10.1/a")])).unwrap();
        assert_eq!(plan.pending, 1);
        assert!(!config.output_root().exists());
    }
}
