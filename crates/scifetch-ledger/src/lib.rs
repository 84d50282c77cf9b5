//! Scifetch Ledger - retrieval status tracking for paper batches
//!
//! Decides, per input record, whether its PDF still has to be fetched,
//! drives the fetch, and keeps a durable status ledger so repeated runs
//! converge without refetching.
//!
//! # Example
//!
//! ```no_run
//! use scifetch_core::ProgressContext;
//! use scifetch_ledger::{CommandFetcher, EngineConfig, read_batch, run};
//!
//! let config = EngineConfig::new("papers");
//! let batch = read_batch(std::path::Path::new("dois.txt")).expect("unreadable input");
//! let fetcher = CommandFetcher::new(config.fetch.clone());
//!
//! let summary = run(&config, &batch, &fetcher, &ProgressContext::hidden())
//!     .expect("run failed");
//! println!("Downloaded {} of {}", summary.downloaded(), summary.analyzed());
//! ```

pub mod config;
pub mod control_log;
pub mod fetch;
pub mod input;
pub mod integrity;
pub mod key;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod resolve;
pub mod runner;
pub mod summary;

// Re-exports for convenience
pub use config::{EngineConfig, FetchSettings};
pub use control_log::ControlLog;
pub use fetch::{CommandFetcher, FailureReason, FetchError, FetchOutcome, Fetcher};
pub use input::{Batch, InputError, read_batch, read_workbook};
pub use orchestrator::{Orchestrator, Outcome};
pub use record::{InputLayout, KeyMode, Record, Status};
pub use resolve::StatusMap;
pub use runner::{Plan, plan, run};
pub use summary::Summary;
