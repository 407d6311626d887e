//! drivededup - duplicate file finder across drives
//!
//! Walks one or more roots, hashes every file with BLAKE3 on a fixed pool of
//! worker threads and indexes the digests in an in-memory SQLite store, so
//! files with identical content can be reported as duplicates. A baseline
//! and a comparison set of roots can be diffed, and files missing from a
//! destination can be copied over.
//!
//! The pieces, leaves first:
//!
//! - [`store`]: the content-addressed index
//! - [`pool`]: hash and copy worker pools
//! - [`coordinator`]: traversal, dispatch and result bookkeeping
//! - [`cli`], [`output`], [`progress`], [`signal`]: the command-line shell

pub mod cancel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod output;
pub mod pool;
pub mod progress;
pub mod signal;
pub mod store;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use cli::{Cli, Commands, CopyArgs, DiffArgs, OutputFormat, ScanArgs};
use config::Config;
use coordinator::CoordinatorHandle;
use error::ExitCode;
use logging::{FileLog, MessageSink};
use output::{JsonDiff, JsonOutput};
use progress::Progress;
use signal::InterruptFlag;

/// Run the application, writing results to stdout.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, the workers cannot be
/// started or the store fails while building the report.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_app_with_writer(cli, &mut out)
}

/// Run the application, writing results to `out`.
///
/// # Errors
///
/// See [`run_app`].
pub fn run_app_with_writer<W: Write>(cli: Cli, out: &mut W) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    log::debug!("Using configuration: {:?}", config);

    let file_log: Arc<dyn MessageSink> = Arc::new(FileLog::open(&config.log_file));
    let (handle, events) =
        coordinator::spawn(&config, file_log).context("Failed to start the coordinator")?;

    let progress = Arc::new(Progress::new(cli.quiet));
    let observer = progress::spawn_observer(events, progress.clone())
        .context("Failed to start the progress display")?;
    let interrupt = signal::install_handler(handle.canceller())?;

    let session = Session {
        handle: &handle,
        interrupt: &interrupt,
        progress: &progress,
    };
    let result = match &cli.command {
        Commands::Scan(args) => session.scan(args, out),
        Commands::Diff(args) => session.diff(args, out),
        Commands::CopyMissing(args) => session.copy_missing(args, out),
    };

    signal::release_handler();
    handle.shutdown();
    if observer.join().is_err() {
        log::warn!("Progress display thread panicked");
    }
    result
}

/// Merge command-line overrides into the layered configuration.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(workers) = cli.hash_workers {
        config.hash_workers = workers;
    }
    if let Some(workers) = cli.copy_workers {
        config.copy_workers = workers;
    }
    if let Some(path) = &cli.log_file {
        config.log_file = path.clone();
    }
    config.validate()?;
    Ok(config)
}

struct Session<'a> {
    handle: &'a CoordinatorHandle,
    interrupt: &'a InterruptFlag,
    progress: &'a Progress,
}

impl Session<'_> {
    /// Scan both sets and wait for every hash to land.
    fn hash_sets(&self, baseline: &[PathBuf], comparison: &[PathBuf]) -> anyhow::Result<()> {
        self.handle.start(baseline.iter().cloned(), true)?;
        if !comparison.is_empty() {
            self.handle.start(comparison.iter().cloned(), false)?;
        }
        self.handle.wait_idle()?;
        Ok(())
    }

    fn finish_code(&self, found: bool) -> ExitCode {
        if self.interrupt.is_interrupted() {
            ExitCode::Interrupted
        } else if found {
            ExitCode::Success
        } else {
            ExitCode::NoDuplicates
        }
    }

    fn scan<W: Write>(&self, args: &ScanArgs, out: &mut W) -> anyhow::Result<ExitCode> {
        self.hash_sets(&args.roots, &args.compare)?;

        let groups = self.handle.report()?;
        let code = self.finish_code(!groups.is_empty());
        match args.format {
            OutputFormat::Text => output::text::write_report(out, &groups)?,
            OutputFormat::Json => {
                let stats = self.handle.stats()?;
                JsonOutput::new(&groups, &stats, code).write_to(out, true)?;
            }
        }
        Ok(code)
    }

    fn diff<W: Write>(&self, args: &DiffArgs, out: &mut W) -> anyhow::Result<ExitCode> {
        self.hash_sets(&args.baseline, &args.comparison)?;

        let missing = self.handle.missing()?;
        let new = self.handle.new_files()?;
        match args.format {
            OutputFormat::Text => {
                output::text::write_paths(out, "Missing", &missing)?;
                output::text::write_paths(out, "New", &new)?;
            }
            OutputFormat::Json => JsonDiff::new(&missing, &new).write_to(out, true)?,
        }
        Ok(self.finish_code(!missing.is_empty() || !new.is_empty()))
    }

    fn copy_missing<W: Write>(&self, args: &CopyArgs, out: &mut W) -> anyhow::Result<ExitCode> {
        self.hash_sets(
            std::slice::from_ref(&args.source),
            std::slice::from_ref(&args.destination),
        )?;
        if self.interrupt.is_interrupted() {
            return Ok(ExitCode::Interrupted);
        }

        self.progress.set_echo(true);
        let queued = self
            .handle
            .copy_missing(&args.source, &args.destination)?;
        self.handle.wait_idle()?;
        self.progress.set_echo(false);

        writeln!(
            out,
            "{queued} file(s) queued for copy to {}",
            args.destination.display()
        )?;
        Ok(self.finish_code(true))
    }
}
