//! Logging utilities with indicatif integration and a per-run log file

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use indicatif::MultiProgress;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

const RUN_LOG_LEVEL: log::Level = log::Level::Info;

/// Append-only run log. Lines carry a local timestamp and never ANSI codes.
struct RunLogFile(Mutex<File>);

impl RunLogFile {
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self(Mutex::new(file)))
    }

    fn write(&self, level: log::Level, args: &std::fmt::Arguments<'_>) {
        let (_, label, _) = level_style(level, false);
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Ok(mut file) = self.0.lock() {
            // Write failures are ignored
            let _ = writeln!(file, "{ts} [{label}] {args}");
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.0.lock() {
            let _ = file.flush();
        }
    }
}

/// Logger that prints through indicatif MultiProgress (TTY) or plain stderr,
/// and mirrors records into the run log file when one is set.
pub struct RunLogger {
    inner: env_logger::Logger,
    multi: Option<MultiProgress>,
    file: Option<RunLogFile>,
}

impl RunLogger {
    fn new(
        inner: env_logger::Logger,
        multi: Option<MultiProgress>,
        file: Option<RunLogFile>,
    ) -> Self {
        Self { inner, multi, file }
    }

    /// The run log keeps info and above even when the terminal is quiet.
    fn file_enabled(&self, metadata: &log::Metadata) -> bool {
        self.file.is_some() && metadata.level() <= RUN_LOG_LEVEL
    }
}

impl log::Log for RunLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata) || self.file_enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        let metadata = record.metadata();
        if let Some(file) = &self.file {
            if self.file_enabled(metadata) || self.inner.enabled(metadata) {
                file.write(record.level(), record.args());
            }
        }
        if !self.inner.enabled(metadata) {
            return;
        }
        match &self.multi {
            Some(multi) => {
                let (pre, label, post) = level_style(record.level(), true);
                let line = format!("[{pre}{label}{post}] {}", record.args());
                multi.suspend(|| eprintln!("{line}"));
            }
            None => {
                // Non-TTY: no ANSI colors
                let (_, label, _) = level_style(record.level(), false);
                eprintln!("[{label}] {}", record.args());
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// Initialize logging.
///
/// `multi` switches to TTY mode (lines routed around progress bars).
/// `log_file` additionally appends every line to that file.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
    log_file: Option<&Path>,
) -> io::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let inner =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .build();
    let max_level = if log_file.is_some() {
        inner.filter().max(RUN_LOG_LEVEL.to_level_filter())
    } else {
        inner.filter()
    };
    let file = log_file.map(RunLogFile::open).transpose()?;

    log::set_boxed_logger(Box::new(RunLogger::new(inner, multi.cloned(), file)))
        .map_err(io::Error::other)?;
    log::set_max_level(max_level);
    Ok(())
}
