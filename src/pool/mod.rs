//! Fixed-size worker pools for hashing and copying.
//!
//! Each pool is a set of threads, one per slot. Every worker owns a bounded
//! job channel, so the coordinator addresses a job to exactly one worker by
//! sending it on that worker's channel. Outcomes of every kind flow back on
//! one shared, unbounded result channel so a worker never blocks on the
//! coordinator while the coordinator is blocked dispatching to it.
//!
//! * [`jobs`]: job, outcome and message types
//! * [`hash_worker`]: BLAKE3 digest worker
//! * [`copy_worker`]: copy worker

pub mod copy_worker;
pub mod hash_worker;
pub mod jobs;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

pub use copy_worker::CopyWorker;
pub use hash_worker::{hash_file, HashWorker, DEFAULT_CHUNK_SIZE};
pub use jobs::{
    slot_for, CopyJob, CopyOutcome, HashJob, HashOutcome, HashResult, WorkerMessage,
};

/// A worker bound to one slot that turns jobs into result messages.
pub trait Worker: Send + 'static {
    type Job: Send + 'static;

    /// The slot this worker answers to.
    fn slot(&self) -> usize;

    /// Short pool name used for thread names and log lines.
    fn kind(&self) -> &'static str;

    /// Run one job to completion.
    fn handle(&self, job: Self::Job) -> WorkerMessage;
}

/// Errors that can occur while hashing a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur while copying a file.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// The destination's parent directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination holds different bytes and is left alone.
    #[error("FAILED to copy {source_path} to {destination}: destination exists with different content")]
    DestinationExists {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// The copy itself failed.
    #[error("FAILED to copy {source_path} to {destination}: {source}")]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by pool management.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// A worker thread could not be started.
    #[error("Failed to spawn {kind} worker {slot}: {source}")]
    Spawn {
        kind: &'static str,
        slot: usize,
        #[source]
        source: std::io::Error,
    },

    /// No worker exists for the slot.
    #[error("No worker for slot {0}")]
    NoSuchSlot(usize),

    /// The worker's channel is closed.
    #[error("Worker {0} is no longer accepting jobs")]
    Disconnected(usize),
}

/// Running pool of workers, addressed by slot.
pub struct Pool<J> {
    kind: &'static str,
    senders: Vec<Sender<J>>,
    threads: Vec<JoinHandle<()>>,
}

impl<J: Send + 'static> Pool<J> {
    /// Start one thread per worker.
    ///
    /// Worker `i` must report slot `i`; each gets a job channel holding at
    /// most `capacity` queued jobs.
    pub fn spawn<W>(
        workers: Vec<W>,
        capacity: usize,
        results: Sender<WorkerMessage>,
    ) -> Result<Self, PoolError>
    where
        W: Worker<Job = J>,
    {
        let kind = workers.first().map_or("empty", W::kind);
        let mut pool = Self {
            kind,
            senders: Vec::with_capacity(workers.len()),
            threads: Vec::with_capacity(workers.len()),
        };

        for (index, worker) in workers.into_iter().enumerate() {
            debug_assert_eq!(worker.slot(), index, "worker slots must be 0..N");
            let slot = worker.slot();
            let (sender, receiver) = bounded::<J>(capacity.max(1));
            let results = results.clone();

            let handle = thread::Builder::new()
                .name(format!("{kind}-{slot}"))
                .spawn(move || {
                    // Jobs run in delivery order; the loop ends when the
                    // pool drops its sender.
                    for job in receiver.iter() {
                        if results.send(worker.handle(job)).is_err() {
                            break;
                        }
                    }
                    log::trace!("{} worker {} stopped", worker.kind(), slot);
                })
                .map_err(|source| PoolError::Spawn { kind, slot, source })?;

            pool.senders.push(sender);
            pool.threads.push(handle);
        }

        log::debug!("Started {} {} workers", pool.senders.len(), kind);
        Ok(pool)
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// True if the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Queue a job for the worker at `slot`, blocking while its queue is full.
    pub fn dispatch(&self, slot: usize, job: J) -> Result<(), PoolError> {
        let sender = self.senders.get(slot).ok_or(PoolError::NoSuchSlot(slot))?;
        sender.send(job).map_err(|_| PoolError::Disconnected(slot))
    }

    /// Close every job channel and wait for the threads to drain and exit.
    pub fn shutdown(&mut self) {
        self.senders.clear();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("A {} worker panicked", self.kind);
            }
        }
    }
}

impl<J> Drop for Pool<J> {
    fn drop(&mut self) {
        self.senders.clear();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
