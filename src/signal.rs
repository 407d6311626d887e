//! Ctrl+C handling.
//!
//! The handler cancels the running scan through a [`Canceller`] and records
//! that an interrupt happened, so the binary can exit with code 130 once
//! outstanding jobs have drained.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivededup::config::Config;
//! use drivededup::coordinator;
//! use drivededup::logging::NullSink;
//! use drivededup::signal::install_handler;
//!
//! let (handle, _) = coordinator::spawn(&Config::default(), Arc::new(NullSink)).unwrap();
//! let interrupt = install_handler(handle.canceller()).expect("Failed to install signal handler");
//!
//! // ... run the scan ...
//! if interrupt.is_interrupted() {
//!     std::process::exit(130);
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::coordinator::Canceller;

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + SIGINT.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared record of whether Ctrl+C was pressed.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    flag: Arc<AtomicBool>,
}

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once an interrupt was received.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Record an interrupt by hand.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// What the process-wide handler acts on. `ctrlc` accepts one handler per
/// process, so later installs swap the target instead of registering again.
struct Target {
    flag: InterruptFlag,
    canceller: Mutex<Option<Canceller>>,
}

static TARGET: OnceLock<Target> = OnceLock::new();

/// Install the Ctrl+C handler and point it at `canceller`.
///
/// Calling this again (e.g. from tests running `run_app` in parallel)
/// retargets the existing handler and clears the interrupt flag.
pub fn install_handler(canceller: Canceller) -> Result<InterruptFlag, SignalError> {
    if let Some(target) = TARGET.get() {
        retarget(target, canceller);
        return Ok(target.flag.clone());
    }

    let target = TARGET.get_or_init(|| Target {
        flag: InterruptFlag::new(),
        canceller: Mutex::new(None),
    });
    retarget(target, canceller);

    match ctrlc::set_handler(on_interrupt) {
        Ok(()) => Ok(target.flag.clone()),
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, interrupts will not cancel");
            Ok(target.flag.clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}

/// Drop the canceller the handler points at.
///
/// The canceller keeps the coordinator's event stream open, so this must
/// run before waiting for that stream to close.
pub fn release_handler() {
    if let Some(target) = TARGET.get() {
        if let Ok(mut slot) = target.canceller.lock() {
            *slot = None;
        }
    }
}

fn retarget(target: &Target, canceller: Canceller) {
    target.flag.reset();
    if let Ok(mut slot) = target.canceller.lock() {
        *slot = Some(canceller);
    }
}

fn on_interrupt() {
    let Some(target) = TARGET.get() else {
        return;
    };
    target.flag.interrupt();

    let _ = writeln!(std::io::stderr(), "\nInterrupted. Cancelling outstanding jobs...");
    let _ = std::io::stderr().flush();
    log::info!("Shutdown signal received");

    if let Ok(slot) = target.canceller.lock() {
        if let Some(canceller) = slot.as_ref() {
            canceller.cancel();
        }
    }
}
