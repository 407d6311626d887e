//! Logging infrastructure for drivededup.
//!
//! Two separate channels exist:
//!
//! * Diagnostic logging through the `log` facade with an `env_logger`
//!   backend, configured by [`init_logging`].
//! * The user-facing message stream. Components receive an explicit
//!   [`MessageSink`] at construction and report progress and recoverable
//!   failures through it. [`FileLog`] appends those messages to a file.
//!
//! Log levels for the diagnostic channel are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! # Example
//!
//! ```rust,no_run
//! use drivededup::logging::{init_logging, FileLog, MessageSink};
//!
//! init_logging(1, false);
//!
//! let sink = FileLog::open(".application-logger.log");
//! sink.message("Recording started");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default file name for the append-only message log.
pub const DEFAULT_LOG_FILE: &str = ".application-logger.log";

/// Receiver for user-facing log messages.
///
/// Every component that reports messages holds an `Arc<dyn MessageSink>`
/// handed to it by its owner. There is no process-wide sink.
pub trait MessageSink: Send + Sync {
    /// Record one message.
    fn message(&self, text: &str);
}

/// Sink that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn message(&self, _text: &str) {}
}

/// Append-only message log.
///
/// Each message becomes one newline-terminated record. The file is opened
/// in append mode and written unbuffered, so records from earlier runs are
/// kept and a crash loses at most the record being written.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileLog {
    /// Open (or create) the log at `path`.
    ///
    /// If the file cannot be opened the sink stays usable but drops every
    /// message, after a single warning through the `log` facade.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                log::debug!("Recording log to file {}", path.display());
                Some(file)
            }
            Err(e) => {
                log::warn!("No log file in use, failed to open {}: {}", path.display(), e);
                None
            }
        };
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    /// Path the log was opened at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a file is actually being written.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.file.lock().map(|f| f.is_some()).unwrap_or(false)
    }
}

impl MessageSink for FileLog {
    fn message(&self, text: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "{text}") {
                log::warn!("Failed to write to {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Initialize the logging subsystem based on CLI verbosity flags.
///
/// This function should be called once at the start of the application,
/// before any logging calls are made. Later calls leave the first logger in
/// place.
pub fn init_logging(verbose: u8, quiet: bool) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();

    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    configure_format(&mut builder, verbose);
    if builder.try_init().is_err() {
        return;
    }

    log::debug!("Logging initialized at level: {}", current_level_name());
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Configure the log format based on verbosity.
///
/// Debug and trace output carry the module path, which is where the worker
/// slot threads are told apart.
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let timestamp = buf.timestamp_seconds();
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}",
                timestamp,
                level,
                record.args()
            )
        }
    });
}

/// Get the current log level as a string.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
