//! Scifetch Core - Common infrastructure for the scifetch workspace
//!
//! Logging, progress display, graceful-shutdown flag and the shared
//! tokio runtime used to drive external fetch processes.

pub mod logging;
pub mod progress;
pub mod runtime;
pub mod shutdown;

// Re-exports for convenience
pub use logging::{RunLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use runtime::SHARED_RUNTIME;
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
