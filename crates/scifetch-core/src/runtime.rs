//! Shared tokio runtime.
//!
//! The engine is strictly sequential and exposes a sync interface; the
//! runtime exists only so a blocking child-process wait can be bounded
//! by `tokio::time::timeout`.

use std::sync::LazyLock;

/// Shared tokio runtime for external process calls.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("scifetch-rt")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
