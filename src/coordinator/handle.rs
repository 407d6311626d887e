//! Caller-side handle to a running coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use super::{Command, Coordinator, CoordinatorError, Event, Messenger};
use crate::cancel::{CancelGroup, CancelToken};
use crate::config::Config;
use crate::logging::MessageSink;
use crate::pool::{CopyWorker, HashWorker, Pool};
use crate::store::{ContentStore, DuplicateGroup, StoreResult, StoreStats};

/// Flips the cancellation tokens shared with the coordinator and workers.
///
/// Cheap to clone; a clone can be moved into a signal handler.
#[derive(Clone)]
pub struct Canceller {
    walk: CancelToken,
    hashers: CancelGroup,
    log: Arc<dyn MessageSink>,
}

impl Canceller {
    pub(crate) fn new(hashers: CancelGroup, log: Arc<dyn MessageSink>) -> Self {
        Self {
            walk: CancelToken::new(),
            hashers,
            log,
        }
    }

    /// Stop the walk and every hash worker at their next poll.
    pub fn cancel(&self) {
        self.log.message("Cancelling all jobs");
        self.walk.cancel();
        self.hashers.cancel_all();
    }

    /// Clear every flag.
    pub fn reset(&self) {
        self.walk.reset();
        self.hashers.reset_all();
    }

    /// True once [`cancel`](Self::cancel) has run and no reset followed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.walk.is_cancelled() || self.hashers.any_cancelled()
    }
}

/// Start the coordinator thread along with its worker pools.
///
/// `log` receives every user-facing message in addition to the returned
/// event stream. An invalid `config` is rejected before any thread starts.
///
/// The event channel is unbounded and carries one [`Event::Message`] and one
/// [`Event::Progress`] per job. Drain the receiver (see
/// [`spawn_observer`](crate::progress::spawn_observer)) or drop it; a
/// receiver that is held but never read grows with the size of the scan.
/// Events sent after the receiver is dropped are discarded.
pub fn spawn(
    config: &Config,
    log: Arc<dyn MessageSink>,
) -> Result<(CoordinatorHandle, Receiver<Event>), CoordinatorError> {
    config.validate()?;
    let store = Arc::new(ContentStore::open_in_memory()?);
    let (event_tx, event_rx) = unbounded();
    let messenger: Arc<dyn MessageSink> = Arc::new(Messenger::new(event_tx.clone(), log));

    let (results_tx, results_rx) = unbounded();
    let hash_tokens = CancelGroup::new(config.hash_workers);
    let hash_workers: Vec<HashWorker> = hash_tokens
        .iter()
        .enumerate()
        .map(|(slot, token)| {
            HashWorker::new(
                slot,
                config.chunk_size,
                token.clone(),
                Arc::clone(&messenger),
            )
        })
        .collect();
    let hashers = Pool::spawn(hash_workers, config.queue_capacity, results_tx.clone())?;

    let copy_workers: Vec<CopyWorker> = (0..config.copy_workers)
        .map(|slot| CopyWorker::new(slot, config.chunk_size, Arc::clone(&messenger)))
        .collect();
    let copiers = Pool::spawn(copy_workers, config.queue_capacity, results_tx)?;

    let canceller = Canceller::new(hash_tokens, Arc::clone(&messenger));
    let (command_tx, command_rx) = unbounded();
    let coordinator = Coordinator::new(
        Arc::clone(&store),
        hashers,
        copiers,
        canceller.clone(),
        messenger,
        event_tx,
        command_rx,
        results_rx,
    );

    let thread = thread::Builder::new()
        .name("coordinator".to_string())
        .spawn(move || coordinator.run())
        .map_err(CoordinatorError::Spawn)?;

    Ok((
        CoordinatorHandle {
            commands: command_tx,
            canceller,
            store,
            thread: Some(thread),
        },
        event_rx,
    ))
}

/// Handle used by the presentation layer to drive a coordinator.
///
/// Dropping the handle stops the coordinator and joins every worker.
pub struct CoordinatorHandle {
    commands: Sender<Command>,
    canceller: Canceller,
    store: Arc<ContentStore>,
    thread: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Queue a scan of `roots`. Returns once the request is queued; watch
    /// for [`Event::Finished`] or call [`wait_idle`](Self::wait_idle).
    pub fn start<I, P>(&self, roots: I, generate: bool) -> Result<(), CoordinatorError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots = roots.into_iter().map(Into::into).collect();
        self.send(Command::Start { roots, generate })
    }

    /// Cancel the current walk and every hash job not yet started.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Cancel and drain outstanding jobs, clear every cancellation flag and
    /// rebuild an empty store. Blocks until done.
    pub fn reset(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::Reset { reply })
    }

    /// Duplicate groups currently in the store.
    pub fn report(&self) -> Result<Vec<DuplicateGroup>, CoordinatorError> {
        self.request(|reply| Command::Report { reply })
    }

    /// Baseline files whose content has no comparison-set copy.
    pub fn missing(&self) -> Result<Vec<PathBuf>, CoordinatorError> {
        self.request(|reply| Command::Missing { reply })
    }

    /// Comparison-set files whose content has no baseline copy.
    pub fn new_files(&self) -> Result<Vec<PathBuf>, CoordinatorError> {
        self.request(|reply| Command::New { reply })
    }

    /// Queue copies of files hashed under `source` whose content is absent
    /// under `destination`. Returns the number of jobs queued.
    pub fn copy_missing(
        &self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<usize, CoordinatorError> {
        let source = source.into();
        let destination = destination.into();
        self.request(|reply| Command::CopyMissing {
            source,
            destination,
            reply,
        })
    }

    /// Store row counts, taken after every earlier command was processed.
    pub fn stats(&self) -> Result<StoreStats, CoordinatorError> {
        self.request(|reply| Command::Stats { reply })
    }

    /// Block until every job queued so far has reported back.
    pub fn wait_idle(&self) -> Result<(), CoordinatorError> {
        self.idle_receiver()?
            .recv()
            .map_err(|_| CoordinatorError::Disconnected)
    }

    /// Like [`wait_idle`](Self::wait_idle), giving up after `timeout`.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> Result<(), CoordinatorError> {
        match self.idle_receiver()?.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(CoordinatorError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CoordinatorError::Disconnected),
        }
    }

    /// Read access to the store.
    #[must_use]
    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    /// A canceller usable from other threads.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Stop the coordinator and join all threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn idle_receiver(&self) -> Result<Receiver<()>, CoordinatorError> {
        let (reply, receiver) = bounded(1);
        self.send(Command::WhenIdle { reply })?;
        Ok(receiver)
    }

    fn request<T>(
        &self,
        command: impl FnOnce(Sender<StoreResult<T>>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (reply, receiver) = bounded(1);
        self.send(command(reply))?;
        let result = receiver
            .recv()
            .map_err(|_| CoordinatorError::Disconnected)?;
        Ok(result?)
    }

    fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .map_err(|_| CoordinatorError::Disconnected)
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            if thread.join().is_err() {
                log::warn!("Coordinator thread panicked");
            }
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
