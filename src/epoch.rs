//! Stale-result guard for the async pipelines.
//!
//! Neither pipeline supports cancellation; instead, callers capture an
//! [`Epoch`] before starting async work and check it before committing the
//! result. Advancing the generation (on library or session change) makes
//! every outstanding token stale, so late completions are discarded rather
//! than committed over newer state.

use std::sync::atomic::{AtomicU64, Ordering};

/// Token identifying one library/session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

#[derive(Debug, Default)]
pub struct Generation {
    counter: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.counter.load(Ordering::SeqCst))
    }

    /// Invalidate all outstanding tokens and return the new epoch.
    pub fn advance(&self) -> Epoch {
        Epoch(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}
