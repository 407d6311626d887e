//! BLAKE3 file hashing worker.
//!
//! Each [`HashWorker`] is bound to one slot. Jobs addressed to another slot
//! are ignored, jobs arriving while the worker's [`CancelToken`] is set are
//! dropped with a message, everything else is streamed through an
//! incremental BLAKE3 hasher in fixed-size chunks.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use super::jobs::{HashJob, HashOutcome, HashResult, WorkerMessage};
use super::{HashError, Worker};
use crate::cancel::CancelToken;
use crate::logging::MessageSink;

/// Default read size for streaming digests.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Compute the hex-encoded BLAKE3 digest of a file, reading `chunk_size`
/// bytes at a time.
///
/// # Errors
///
/// Returns [`HashError`] if the file cannot be opened or a read fails.
pub fn hash_file(path: &Path, chunk_size: usize) -> Result<String, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashError::from_io(path, e)),
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash worker bound to a fixed slot.
pub struct HashWorker {
    slot: usize,
    chunk_size: usize,
    cancel: CancelToken,
    log: Arc<dyn MessageSink>,
}

impl HashWorker {
    /// Create a worker for `slot`.
    ///
    /// The worker polls `cancel` before every job; the caller keeps a clone
    /// of the token to cancel or reset this worker.
    #[must_use]
    pub fn new(
        slot: usize,
        chunk_size: usize,
        cancel: CancelToken,
        log: Arc<dyn MessageSink>,
    ) -> Self {
        log::trace!("Hashing thread [{}] configured", slot);
        Self {
            slot,
            chunk_size,
            cancel,
            log,
        }
    }

    /// Process one job.
    pub fn process(&self, job: &HashJob) -> HashOutcome {
        if job.slot != self.slot {
            return HashOutcome::Misrouted;
        }

        if self.cancel.is_cancelled() {
            self.log.message(&format!(
                "Hashing thread [{}] - all jobs cancelled; ignoring {}",
                self.slot,
                job.path.display()
            ));
            return HashOutcome::Cancelled {
                path: job.path.clone(),
            };
        }

        self.log.message(&format!(
            "Hashing thread [{}] - job accepted - {} (generate: {})",
            self.slot,
            job.path.display(),
            job.generate
        ));

        match hash_file(&job.path, self.chunk_size) {
            Ok(hash) => {
                log::debug!(
                    "Hashing thread [{}] - job completed - {}",
                    self.slot,
                    job.path.display()
                );
                HashOutcome::Hashed(HashResult {
                    path: job.path.clone(),
                    hash,
                    generate: job.generate,
                })
            }
            Err(e) => {
                self.log.message(&format!(
                    "Hashing thread [{}] - failed to read: {}",
                    self.slot, e
                ));
                HashOutcome::Failed {
                    path: job.path.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

}

impl Worker for HashWorker {
    type Job = HashJob;

    fn slot(&self) -> usize {
        self.slot
    }

    fn kind(&self) -> &'static str {
        "hash"
    }

    fn handle(&self, job: HashJob) -> WorkerMessage {
        WorkerMessage::Hash {
            slot: self.slot,
            outcome: self.process(&job),
        }
    }
}
