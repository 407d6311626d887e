//! Job and result types exchanged between the coordinator and the pools.

use std::path::PathBuf;

/// Pick the worker slot for the `counter`-th job of a run.
///
/// # Panics
///
/// Debug assertion fails if `workers` is zero.
#[must_use]
pub fn slot_for(counter: u64, workers: usize) -> usize {
    debug_assert!(workers > 0, "pool must have at least one worker");
    (counter % workers.max(1) as u64) as usize
}

/// A file to digest, addressed to one hash worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashJob {
    pub slot: usize,
    pub path: PathBuf,
    /// Baseline (`true`) or comparison (`false`) namespace
    pub generate: bool,
}

/// A file to copy, addressed to one copy worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub slot: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Content hash of `source`, recorded for the destination on success
    pub hash: String,
}

/// Successful digest of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub path: PathBuf,
    /// Lowercase hex digest
    pub hash: String,
    pub generate: bool,
}

/// What a hash worker did with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    Hashed(HashResult),
    /// The file could not be read; the job was skipped.
    Failed { path: PathBuf, error: String },
    /// The worker's cancellation flag was set before the job started.
    Cancelled { path: PathBuf },
    /// The job carried another worker's slot and was ignored.
    Misrouted,
}

/// What a copy worker did with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied {
        source: PathBuf,
        destination: PathBuf,
        hash: String,
    },
    /// The destination already held identical bytes; nothing was written.
    AlreadyPresent {
        source: PathBuf,
        destination: PathBuf,
        hash: String,
    },
    Failed {
        source: PathBuf,
        destination: PathBuf,
        error: String,
    },
    Misrouted,
}

/// Message from any worker back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Hash { slot: usize, outcome: HashOutcome },
    Copy { slot: usize, outcome: CopyOutcome },
}
