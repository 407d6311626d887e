//! Command-line interface definitions for drivededup.
//!
//! The CLI follows standard conventions with global options (verbosity,
//! configuration, logging) and one subcommand per workflow.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates across two drives
//! drivededup scan /mnt/photos /mnt/backup
//!
//! # Files on the old drive that never made it to the new one
//! drivededup diff --baseline /mnt/old --comparison /mnt/new
//!
//! # Fill the gaps
//! drivededup copy-missing /mnt/old /mnt/new
//!
//! # Verbose mode for debugging
//! drivededup -v scan ~/Pictures --format json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Find duplicate files across drives by content hash.
///
/// drivededup walks every root, hashes each file with BLAKE3 on a pool of
/// worker threads and reports files that share content.
#[derive(Debug, Parser)]
#[command(name = "drivededup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors and results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Append messages to this file instead of the configured log file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Number of hash workers (overrides configuration)
    #[arg(long, value_name = "N", global = true)]
    pub hash_workers: Option<usize>,

    /// Number of copy workers (overrides configuration)
    #[arg(long, value_name = "N", global = true)]
    pub copy_workers: Option<usize>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories and report duplicate files
    Scan(ScanArgs),
    /// Compare a baseline set of roots against a comparison set
    Diff(DiffArgs),
    /// Copy files whose content is absent from the destination
    CopyMissing(CopyArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan (baseline set)
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Additional directories scanned as the comparison set
    #[arg(long, value_name = "ROOT", num_args = 1..)]
    pub compare: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the diff subcommand.
#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Baseline directories
    #[arg(long, value_name = "ROOT", num_args = 1.., required = true)]
    pub baseline: Vec<PathBuf>,

    /// Comparison directories
    #[arg(long, value_name = "ROOT", num_args = 1.., required = true)]
    pub comparison: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the copy-missing subcommand.
#[derive(Debug, Args)]
pub struct CopyArgs {
    /// Directory to copy from
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory to copy into, mirroring the source layout
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
