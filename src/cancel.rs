//! Per-worker cancellation tokens.
//!
//! Every hash worker owns one [`CancelToken`]. The coordinator keeps a clone
//! of each token so that `Cancel()` and `Reset()` can flip them from the
//! outside, while the worker polls its own token before starting each job.
//!
//! Cancellation is cooperative: a job that is already reading its file runs
//! to completion, only jobs that have not started yet are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for one worker slot.
///
/// Cloning the token shares the underlying flag, so a clone held by the
/// coordinator controls the worker that holds the other clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the "not cancelled" state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the worker accepts jobs again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Cancellation tokens for a whole pool, indexed by slot.
#[derive(Debug, Clone, Default)]
pub struct CancelGroup {
    tokens: Vec<CancelToken>,
}

impl CancelGroup {
    /// Create `count` independent tokens.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            tokens: (0..count).map(|_| CancelToken::new()).collect(),
        }
    }

    /// Tokens in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &CancelToken> {
        self.tokens.iter()
    }

    /// Cancel every slot.
    pub fn cancel_all(&self) {
        self.tokens.iter().for_each(CancelToken::cancel);
    }

    /// Clear every slot's flag.
    pub fn reset_all(&self) {
        self.tokens.iter().for_each(CancelToken::reset);
    }

    /// True if any slot is still cancelled.
    #[must_use]
    pub fn any_cancelled(&self) -> bool {
        self.tokens.iter().any(CancelToken::is_cancelled)
    }
}
