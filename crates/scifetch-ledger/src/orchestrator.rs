//! Per-record download state machine
//!
//! ```text
//!   Ok ───────────────────────────────► skip ("already downloaded")
//!   Nonexistent ──────────────────────► skip ("without DOI")
//!   None / NotAvailable ─┬─ no DOI ───► Nonexistent (persisted)
//!                        └─ DOI ──► fetch ─┬─ verified ─► Ok (persisted)
//!                                          └─ failed ───► NotAvailable
//!                                                         (persisted only
//!                                                          if prior None)
//! ```

use std::path::PathBuf;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::control_log::ControlLog;
use crate::fetch::{self, FailureReason, FetchOutcome, Fetcher};
use crate::key::ArtifactKey;
use crate::record::{KeyMode, Record, Status};
use crate::resolve::{self, StatusMap};

/// What happened to one record this run.
#[derive(Debug)]
pub enum Outcome {
    /// Resolved `Ok`; nothing fetched
    AlreadyDownloaded,
    /// No DOI; terminal `Nonexistent`
    WithoutDoi,
    Downloaded(PathBuf),
    /// Fetch or verification failed; retried next run
    NotAvailable(FailureReason),
}

impl Outcome {
    /// Status reported for the record in the summary.
    pub fn status(&self) -> Status {
        match self {
            Self::AlreadyDownloaded | Self::Downloaded(_) => Status::Ok,
            Self::WithoutDoi => Status::Nonexistent,
            Self::NotAvailable(_) => Status::NotAvailable,
        }
    }

    /// Whether the fetch collaborator was invoked.
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Downloaded(_) | Self::NotAvailable(_))
    }
}

/// Drives records through the state machine, one at a time.
///
/// Every status transition reaches the control log (when one is attached)
/// before `process` returns.
pub struct Orchestrator<'a> {
    config: &'a EngineConfig,
    mode: KeyMode,
    fetcher: &'a dyn Fetcher,
    control_log: Option<&'a ControlLog>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a EngineConfig,
        mode: KeyMode,
        fetcher: &'a dyn Fetcher,
        control_log: Option<&'a ControlLog>,
    ) -> Self {
        Self {
            config,
            mode,
            fetcher,
            control_log,
        }
    }

    /// Process one record against the live status map.
    ///
    /// Errors only when a transition cannot be persisted; fetch failures
    /// are an [`Outcome`], not an error.
    pub fn process(&self, record: &Record, statuses: &mut StatusMap) -> Result<Outcome> {
        let artifact = ArtifactKey::for_record(record, self.mode);
        let prior = resolve::resolve(record, self.mode, statuses);

        match prior {
            Some(Status::Ok) => {
                log::info!("Paper already downloaded");
                return Ok(Outcome::AlreadyDownloaded);
            }
            Some(Status::Nonexistent) => {
                log::info!("Paper without DOI");
                return Ok(Outcome::WithoutDoi);
            }
            Some(Status::NotAvailable) | None => {}
        }

        let Some(doi) = record.doi() else {
            log::info!("Paper without DOI");
            self.transition(statuses, &artifact.key, Status::Nonexistent)?;
            return Ok(Outcome::WithoutDoi);
        };

        log::info!("Downloading paper... (DOI {doi})");
        let target = artifact.path(self.config.output_root());
        match fetch::fetch_and_verify(self.fetcher, doi, &target, self.config.verify_pdf) {
            FetchOutcome::Fetched(path) => {
                log::info!("Paper downloaded: {}", artifact.filename);
                self.transition(statuses, &artifact.key, Status::Ok)?;
                Ok(Outcome::Downloaded(path))
            }
            FetchOutcome::Failed(reason) => {
                log::warn!("Download link not available: {reason}");
                // A repeat failure leaves the log untouched
                if prior.is_none() {
                    self.transition(statuses, &artifact.key, Status::NotAvailable)?;
                }
                Ok(Outcome::NotAvailable(reason))
            }
        }
    }

    fn transition(&self, statuses: &mut StatusMap, key: &str, status: Status) -> Result<()> {
        if statuses.record(key, status) {
            if let Some(control_log) = self.control_log {
                control_log.append(key, status)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records every DOI it is asked for; writes bytes or fails.
    struct RecordingFetcher {
        succeed: bool,
        calls: RefCell<Vec<String>>,
    }

    impl RecordingFetcher {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for RecordingFetcher {
        fn fetch(&self, doi: &str, target: &Path) -> Result<(), FetchError> {
            self.calls.borrow_mut().push(doi.to_string());
            if self.succeed {
                fs::write(target, b"payload").map_err(FetchError::Spawn)
            } else {
                Err(FetchError::NoSuccessMarker)
            }
        }
    }

    fn config(dir: &TempDir) -> EngineConfig {
        let mut config = EngineConfig::new(dir.path());
        config.verify_pdf = false;
        config
    }

    fn doi_record(doi: Option<&str>) -> Record {
        Record {
            index: 1,
            doi: doi.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn ok_record_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let fetcher = RecordingFetcher::new(true);
        let orch = Orchestrator::new(&config, KeyMode::Doi, &fetcher, None);

        let mut statuses = StatusMap::new();
        statuses.record("10.1/a", Status::Ok);
        let outcome = orch.process(&doi_record(Some("10.1/a")), &mut statuses).unwrap();

        assert!(matches!(outcome, Outcome::AlreadyDownloaded));
        assert!(fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn missing_doi_never_fetched() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = ControlLog::new(config.control_log_path());
        let fetcher = RecordingFetcher::new(true);
        let orch = Orchestrator::new(&config, KeyMode::Doi, &fetcher, Some(&log));

        let mut statuses = StatusMap::new();
        let outcome = orch.process(&doi_record(None), &mut statuses).unwrap();

        assert!(matches!(outcome, Outcome::WithoutDoi));
        assert_eq!(outcome.status(), Status::Nonexistent);
        assert!(!outcome.attempted());
        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(log.read().unwrap().get(""), Some(Status::Nonexistent));
    }

    #[test]
    fn success_persists_ok() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = ControlLog::new(config.control_log_path());
        let fetcher = RecordingFetcher::new(true);
        let orch = Orchestrator::new(&config, KeyMode::Doi, &fetcher, Some(&log));

        let mut statuses = StatusMap::new();
        let outcome = orch.process(&doi_record(Some("10.1/a")), &mut statuses).unwrap();

        let Outcome::Downloaded(path) = outcome else {
            panic!("expected download");
        };
        assert_eq!(path, dir.path().join("Papers").join("10.1%2Fa.pdf"));
        assert!(path.is_file());
        assert_eq!(statuses.get("10.1/a"), Some(Status::Ok));
        assert_eq!(log.read().unwrap().get("10.1/a"), Some(Status::Ok));
    }

    #[test]
    fn repeat_failure_not_persisted_twice() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = ControlLog::new(config.control_log_path());
        let fetcher = RecordingFetcher::new(false);
        let orch = Orchestrator::new(&config, KeyMode::Doi, &fetcher, Some(&log));

        let mut statuses = StatusMap::new();
        let record = doi_record(Some("10.1/a"));
        orch.process(&record, &mut statuses).unwrap();
        let outcome = orch.process(&record, &mut statuses).unwrap();

        assert!(matches!(outcome, Outcome::NotAvailable(_)));
        assert_eq!(fetcher.calls.borrow().len(), 2);
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("10.1/a\tNot available").count(), 1);
    }

    #[test]
    fn metadata_mode_writes_under_document_type() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let fetcher = RecordingFetcher::new(true);
        let orch = Orchestrator::new(&config, KeyMode::Metadata, &fetcher, None);

        let record = Record {
            index: 3,
            title: Some("Foo [preprint]".into()),
            year: Some(2021),
            document_type: Some("Article".into()),
            doi: Some("10.1/foo".into()),
            ..Default::default()
        };
        let mut statuses = StatusMap::new();
        orch.process(&record, &mut statuses).unwrap();

        assert!(dir.path().join("Article/2021.Foo.pdf").is_file());
        assert_eq!(statuses.get("Article.2021.Foo.pdf"), Some(Status::Ok));
        assert!(!config.control_log_path().exists());
    }
}
