//! Scan coordination.
//!
//! The [`Coordinator`] runs on its own thread. It owns both worker pools and
//! the write side of the [`ContentStore`], walks directory trees, assigns
//! each discovered file a hash slot and records results as they arrive.
//! Callers drive it through a [`CoordinatorHandle`] and observe it through a
//! stream of [`Event`]s.
//!
//! # Concurrency
//!
//! Commands and worker results arrive on two channels multiplexed with
//! `select!`, so result handling is serialized on the coordinator thread.
//! Cancellation does not go through the command channel: the handle flips
//! the shared tokens directly, which lets a cancel take effect while the
//! coordinator is busy walking a large tree.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivededup::config::Config;
//! use drivededup::coordinator;
//! use drivededup::logging::NullSink;
//!
//! let (handle, _) = coordinator::spawn(&Config::default(), Arc::new(NullSink))?;
//! handle.start(["/mnt/a", "/mnt/b"], true)?;
//! handle.wait_idle()?;
//! for group in handle.report()? {
//!     println!("{} ({} copies)", group.hash, group.len());
//! }
//! # Ok::<(), drivededup::coordinator::CoordinatorError>(())
//! ```

pub mod handle;
pub mod walk;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver, Sender};

use crate::config::ConfigError;
use crate::logging::MessageSink;
use crate::pool::{
    slot_for, CopyJob, CopyOutcome, HashJob, HashOutcome, HashResult, Pool, PoolError,
    WorkerMessage,
};
use crate::store::{ContentStore, DuplicateGroup, StoreError, StoreResult, StoreStats};

pub use handle::{spawn, Canceller, CoordinatorHandle};

/// Notifications emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A scan is about to walk its roots.
    Started,
    /// Every job of the current `Start` call has been queued. Jobs may still
    /// be running.
    Pending,
    /// The walk is over and every queued job has reported back.
    Finished,
    /// One more job reported back.
    Progress { completed: u64, dispatched: u64 },
    /// A user-facing log message.
    Message(String),
    DuplicateReport(Vec<DuplicateGroup>),
    Missing(Vec<PathBuf>),
    New(Vec<PathBuf>),
}

/// Errors returned to callers of the coordinator.
#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    /// The coordinator thread is gone.
    #[error("Coordinator is not running")]
    Disconnected,

    /// The coordinator did not become idle in time.
    #[error("Timed out waiting for outstanding jobs")]
    Timeout,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The coordinator thread could not be started.
    #[error("Failed to spawn coordinator thread: {0}")]
    Spawn(#[source] std::io::Error),
}

type Reply<T> = Sender<StoreResult<T>>;

/// Requests processed in order on the coordinator thread.
pub(crate) enum Command {
    Start { roots: Vec<PathBuf>, generate: bool },
    Reset { reply: Reply<()> },
    Report { reply: Reply<Vec<DuplicateGroup>> },
    Missing { reply: Reply<Vec<PathBuf>> },
    New { reply: Reply<Vec<PathBuf>> },
    CopyMissing {
        source: PathBuf,
        destination: PathBuf,
        reply: Reply<usize>,
    },
    Stats { reply: Reply<StoreStats> },
    WhenIdle { reply: Sender<()> },
    Shutdown,
}

/// Message sink that fans out to the diagnostic log, an extra sink and the
/// event stream.
pub(crate) struct Messenger {
    events: Sender<Event>,
    extra: Arc<dyn MessageSink>,
}

impl Messenger {
    pub(crate) fn new(events: Sender<Event>, extra: Arc<dyn MessageSink>) -> Self {
        Self { events, extra }
    }
}

impl MessageSink for Messenger {
    fn message(&self, text: &str) {
        log::debug!("{text}");
        self.extra.message(text);
        // Nobody listening is fine.
        let _ = self.events.send(Event::Message(text.to_string()));
    }
}

/// State owned by the coordinator thread.
pub(crate) struct Coordinator {
    store: Arc<ContentStore>,
    hashers: Pool<HashJob>,
    copiers: Pool<CopyJob>,
    canceller: Canceller,
    log: Arc<dyn MessageSink>,
    events: Sender<Event>,
    commands: Receiver<Command>,
    results: Receiver<WorkerMessage>,
    hash_counter: u64,
    copy_counter: u64,
    outstanding: u64,
    dispatched: u64,
    completed: u64,
    run_active: bool,
    idle_waiters: Vec<Sender<()>>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<ContentStore>,
        hashers: Pool<HashJob>,
        copiers: Pool<CopyJob>,
        canceller: Canceller,
        log: Arc<dyn MessageSink>,
        events: Sender<Event>,
        commands: Receiver<Command>,
        results: Receiver<WorkerMessage>,
    ) -> Self {
        Self {
            store,
            hashers,
            copiers,
            canceller,
            log,
            events,
            commands,
            results,
            hash_counter: 0,
            copy_counter: 0,
            outstanding: 0,
            dispatched: 0,
            completed: 0,
            run_active: false,
            idle_waiters: Vec::new(),
        }
    }

    /// Serve commands and results until shutdown.
    pub(crate) fn run(mut self) {
        log::debug!(
            "Coordinator running with {} hashers and {} copiers",
            self.hashers.len(),
            self.copiers.len()
        );

        loop {
            select! {
                recv(self.commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle_command(command),
                },
                recv(self.results) -> message => match message {
                    Ok(message) => self.handle_result(message),
                    Err(_) => break,
                },
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { roots, generate } => self.start(roots, generate),
            Command::Reset { reply } => {
                let _ = reply.send(self.reset());
            }
            Command::Report { reply } => {
                let _ = reply.send(self.report());
            }
            Command::Missing { reply } => {
                let result = self.store.missing_files();
                if let Ok(paths) = &result {
                    self.emit(Event::Missing(paths.clone()));
                }
                let _ = reply.send(self.logged(result));
            }
            Command::New { reply } => {
                let result = self.store.new_files();
                if let Ok(paths) = &result {
                    self.emit(Event::New(paths.clone()));
                }
                let _ = reply.send(self.logged(result));
            }
            Command::CopyMissing {
                source,
                destination,
                reply,
            } => {
                let _ = reply.send(self.copy_missing(&source, &destination));
            }
            Command::Stats { reply } => {
                let result = self.store.stats();
                let _ = reply.send(self.logged(result));
            }
            Command::WhenIdle { reply } => {
                if self.outstanding == 0 {
                    let _ = reply.send(());
                } else {
                    self.idle_waiters.push(reply);
                }
            }
            Command::Shutdown => {}
        }
    }

    /// Walk every root and queue one hash job per file found.
    fn start(&mut self, roots: Vec<PathBuf>, generate: bool) {
        if self.outstanding == 0 {
            self.dispatched = 0;
            self.completed = 0;
        }
        self.run_active = true;
        self.emit(Event::Started);
        log::info!("Scanning {} root(s), generate: {}", roots.len(), generate);

        for root in roots {
            match walk::resolve_root(&root) {
                Ok(root) => self.walk(root, generate),
                Err(e) => self.log.message(&format!("Skipping root - {e}")),
            }
        }

        log::info!("{} job(s) outstanding", self.outstanding);
        self.emit(Event::Pending);
        self.check_idle();
    }

    fn walk(&mut self, root: PathBuf, generate: bool) {
        let mut queue = VecDeque::from([root]);

        while let Some(dir) = queue.pop_front() {
            if self.canceller.is_cancelled() {
                self.log
                    .message(&format!("Cancelling on path {}", dir.display()));
                return;
            }
            self.log
                .message(&format!("Processing path {}", dir.display()));

            let (listing, errors) = walk::list_directory(&dir);
            for error in errors {
                self.log.message(&format!("Could not read - {error}"));
            }
            queue.extend(listing.dirs);
            for file in listing.files {
                self.dispatch_hash(file, generate);
            }
        }
    }

    fn dispatch_hash(&mut self, path: PathBuf, generate: bool) {
        let slot = slot_for(self.hash_counter, self.hashers.len());
        self.hash_counter += 1;

        if let Err(e) = self.store.add_file(&path, generate) {
            self.log.message(&format!(
                "Could not record file {} - {e}",
                path.display()
            ));
        }

        match self.hashers.dispatch(
            slot,
            HashJob {
                slot,
                path,
                generate,
            },
        ) {
            Ok(()) => self.queued(),
            Err(e) => self.log.message(&format!("Could not queue hash job - {e}")),
        }
    }

    /// Queue a copy job for every hashed file under `source` whose content
    /// has no file under `destination`.
    fn copy_missing(&mut self, source: &Path, destination: &Path) -> StoreResult<usize> {
        let (source, destination) = match (
            std::path::absolute(source),
            std::path::absolute(destination),
        ) {
            (Ok(s), Ok(d)) => (s, d),
            _ => {
                self.log.message(&format!(
                    "Cannot resolve copy roots {} and {}",
                    source.display(),
                    destination.display()
                ));
                return Ok(0);
            }
        };

        let candidates = self.logged(self.store.copy_candidates(&source, &destination))?;
        if candidates.is_empty() {
            self.log.message(&format!(
                "Nothing to copy from {} to {}",
                source.display(),
                destination.display()
            ));
            return Ok(0);
        }

        if self.outstanding == 0 {
            self.dispatched = 0;
            self.completed = 0;
        }
        self.run_active = true;

        let mut queued = 0;
        for candidate in candidates {
            let slot = slot_for(self.copy_counter, self.copiers.len());
            self.copy_counter += 1;
            let job = CopyJob {
                slot,
                source: candidate.source,
                destination: candidate.destination,
                hash: candidate.hash,
            };
            match self.copiers.dispatch(slot, job) {
                Ok(()) => {
                    self.queued();
                    queued += 1;
                }
                Err(e) => self.log.message(&format!("Could not queue copy job - {e}")),
            }
        }

        self.emit(Event::Pending);
        self.check_idle();
        Ok(queued)
    }

    fn handle_result(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Hash { outcome, .. } => match outcome {
                HashOutcome::Hashed(result) => self.receive_hash_result(result),
                HashOutcome::Failed { path, error } => {
                    log::warn!("Skipped {}: {}", path.display(), error);
                }
                HashOutcome::Cancelled { .. } | HashOutcome::Misrouted => {}
            },
            WorkerMessage::Copy { outcome, .. } => match outcome {
                CopyOutcome::Copied {
                    destination, hash, ..
                }
                | CopyOutcome::AlreadyPresent {
                    destination, hash, ..
                } => {
                    if let Err(e) = self.store.associate_file(&destination, &hash, false) {
                        self.log.message(&format!(
                            "Could not record copy {} - {e}",
                            destination.display()
                        ));
                    }
                }
                CopyOutcome::Failed { .. } | CopyOutcome::Misrouted => {}
            },
        }
        self.settled();
    }

    /// Record one digest. A failed write is reported and the run goes on.
    fn receive_hash_result(&mut self, result: HashResult) {
        self.log.message(&format!(
            "Received hash {} on file {} - generate: {}",
            result.hash,
            result.path.display(),
            result.generate
        ));
        if let Err(e) = self
            .store
            .associate_file(&result.path, &result.hash, result.generate)
        {
            self.log.message(&format!(
                "Could not associate {} - {e}",
                result.path.display()
            ));
        }
    }

    /// Cancel anything in flight, wait for it to report, then wipe the store.
    fn reset(&mut self) -> StoreResult<()> {
        if self.outstanding > 0 {
            self.log.message(&format!(
                "Cancelling {} outstanding job(s) before reset",
                self.outstanding
            ));
            self.canceller.cancel();
            self.drain();
        }

        self.canceller.reset();
        self.hash_counter = 0;
        self.copy_counter = 0;
        self.dispatched = 0;
        self.completed = 0;
        self.run_active = false;

        self.log.message("Resetting database...");
        let result = self.store.reset();
        self.check_idle();
        self.logged(result)
    }

    /// Discard results until every outstanding job has reported.
    fn drain(&mut self) {
        while self.outstanding > 0 {
            match self.results.recv() {
                Ok(_) => self.outstanding -= 1,
                Err(_) => {
                    self.outstanding = 0;
                }
            }
        }
    }

    fn report(&mut self) -> StoreResult<Vec<DuplicateGroup>> {
        let files = self.logged(self.store.duplicate_groups())?;
        let paths = self.logged(self.store.duplicate_path_groups())?;
        let groups: Vec<DuplicateGroup> = files.into_iter().chain(paths).collect();

        log::info!("Report holds {} duplicate group(s)", groups.len());
        self.emit(Event::DuplicateReport(groups.clone()));
        Ok(groups)
    }

    fn queued(&mut self) {
        self.outstanding += 1;
        self.dispatched += 1;
    }

    fn settled(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.completed += 1;
        self.emit(Event::Progress {
            completed: self.completed,
            dispatched: self.dispatched,
        });
        self.check_idle();
    }

    fn check_idle(&mut self) {
        if self.outstanding > 0 {
            return;
        }
        if self.run_active {
            self.run_active = false;
            log::info!("All {} job(s) reported", self.completed);
            self.emit(Event::Finished);
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Pass a store result through, reporting a failure as a message.
    fn logged<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            self.log.message(&format!("Store error - {e}"));
        }
        result
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn shutdown(&mut self) {
        self.canceller.cancel();
        self.log.message("Stopping hashers");
        self.hashers.shutdown();
        self.log.message("Stopping copiers");
        self.copiers.shutdown();
        self.log.message("All tasks stopped");
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
