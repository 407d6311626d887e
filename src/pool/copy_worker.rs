//! File copying worker.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use super::hash_worker::hash_file;
use super::jobs::{CopyJob, CopyOutcome, WorkerMessage};
use super::{CopyError, Worker};
use crate::logging::MessageSink;

/// Copy worker bound to a fixed slot.
///
/// Creates the destination's parent directories on demand, then copies the
/// source byte-for-byte. An existing destination is never overwritten: one
/// that already holds identical bytes counts as present, anything else
/// fails the job.
pub struct CopyWorker {
    slot: usize,
    chunk_size: usize,
    log: Arc<dyn MessageSink>,
}

impl CopyWorker {
    #[must_use]
    pub fn new(slot: usize, chunk_size: usize, log: Arc<dyn MessageSink>) -> Self {
        Self {
            slot,
            chunk_size,
            log,
        }
    }

    /// Process one job.
    pub fn process(&self, job: &CopyJob) -> CopyOutcome {
        if job.slot != self.slot {
            return CopyOutcome::Misrouted;
        }

        match self.copy(&job.source, &job.destination) {
            Ok(true) => {
                self.log.message(&format!(
                    "Copier [{}] - Copied {} to {}",
                    self.slot,
                    job.source.display(),
                    job.destination.display()
                ));
                CopyOutcome::Copied {
                    source: job.source.clone(),
                    destination: job.destination.clone(),
                    hash: job.hash.clone(),
                }
            }
            Ok(false) => {
                self.log.message(&format!(
                    "Copier [{}] - {} already present",
                    self.slot,
                    job.destination.display()
                ));
                CopyOutcome::AlreadyPresent {
                    source: job.source.clone(),
                    destination: job.destination.clone(),
                    hash: job.hash.clone(),
                }
            }
            Err(e) => {
                self.log
                    .message(&format!("Copier [{}] - {}", self.slot, e));
                self.log.message(&format!(
                    "Copier [{}] - Did not copy {}",
                    self.slot,
                    job.destination.display()
                ));
                CopyOutcome::Failed {
                    source: job.source.clone(),
                    destination: job.destination.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Returns `Ok(true)` if bytes were written, `Ok(false)` if the
    /// destination was already identical.
    fn copy(&self, source: &Path, destination: &Path) -> Result<bool, CopyError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CopyError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let copy_error = |e: io::Error| CopyError::Copy {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source: e,
        };

        let mut reader = File::open(source).map_err(copy_error)?;
        let mut writer = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.is_identical(source, destination) {
                    return Ok(false);
                }
                return Err(CopyError::DestinationExists {
                    source_path: source.to_path_buf(),
                    destination: destination.to_path_buf(),
                });
            }
            Err(e) => return Err(copy_error(e)),
        };

        if let Err(e) = io::copy(&mut reader, &mut writer) {
            // Only remove what this job created.
            drop(writer);
            let _ = fs::remove_file(destination);
            return Err(copy_error(e));
        }
        if let Ok(meta) = reader.metadata() {
            let _ = writer.set_permissions(meta.permissions());
        }
        Ok(true)
    }

    fn is_identical(&self, source: &Path, destination: &Path) -> bool {
        let (Ok(src_meta), Ok(dst_meta)) = (fs::metadata(source), fs::metadata(destination))
        else {
            return false;
        };
        if !dst_meta.is_file() || src_meta.len() != dst_meta.len() {
            return false;
        }
        match (
            hash_file(source, self.chunk_size),
            hash_file(destination, self.chunk_size),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Worker for CopyWorker {
    type Job = CopyJob;

    fn slot(&self) -> usize {
        self.slot
    }

    fn kind(&self) -> &'static str {
        "copy"
    }

    fn handle(&self, job: CopyJob) -> WorkerMessage {
        WorkerMessage::Copy {
            slot: self.slot,
            outcome: self.process(&job),
        }
    }
}
