//! Global change counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter advanced by exactly one on every committed write.
///
/// Shared between the store actor (the only writer) and every
/// [`Pasteboard`](super::Pasteboard) handle, so reading the current value
/// never goes through the command queue.
#[derive(Debug, Default)]
pub struct VersionCounter(AtomicU64);

impl VersionCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance and return the new value.
    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}
