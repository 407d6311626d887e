//! JSON output for duplicate reports and set differences.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     { "hash": "abc123...", "files": ["/a/x.txt", "/a/b/y.txt"] }
//!   ],
//!   "summary": {
//!     "files": 2,
//!     "hashes": 1,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "DD000"
//!   }
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ExitCode;
use crate::store::{DuplicateGroup, StoreStats};

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// BLAKE3 hash as hexadecimal string
    pub hash: String,
    /// Every file sharing the hash
    pub files: Vec<String>,
}

impl From<&DuplicateGroup> for JsonDuplicateGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash.clone(),
            files: group.paths.iter().map(|p| display_path(p)).collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files recorded in the store
    pub files: u64,
    /// Distinct content hashes
    pub hashes: u64,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Files beyond the first in each group
    pub duplicate_files: usize,
    /// Whether the run was interrupted
    pub interrupted: bool,
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DD000")
    pub exit_code_name: String,
}

/// Complete JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub duplicates: Vec<JsonDuplicateGroup>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], stats: &StoreStats, exit_code: ExitCode) -> Self {
        Self {
            duplicates: groups.iter().map(JsonDuplicateGroup::from).collect(),
            summary: JsonSummary {
                files: stats.files,
                hashes: stats.hashes,
                duplicate_groups: groups.len(),
                duplicate_files: groups.iter().map(|g| g.len().saturating_sub(1)).sum(),
                interrupted: exit_code == ExitCode::Interrupted,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// Missing/new lists in JSON format.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JsonDiff {
    /// Baseline files with no comparison-set counterpart
    pub missing: Vec<String>,
    /// Comparison-set files with no baseline counterpart
    pub new: Vec<String>,
}

impl JsonDiff {
    #[must_use]
    pub fn new(missing: &[PathBuf], new: &[PathBuf]) -> Self {
        Self {
            missing: missing.iter().map(|p| display_path(p)).collect(),
            new: new.iter().map(|p| display_path(p)).collect(),
        }
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
