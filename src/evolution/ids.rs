//! Run-wide agent id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out agent ids, starting at 1 and never repeating.
///
/// Shared by reference with everything that creates agents; `next` is a single
/// atomic increment, so concurrent callers always receive distinct ids.
#[derive(Debug)]
pub struct IdAllocator {
    next_id: AtomicU64,
}

impl IdAllocator {
    /// First id of every run.
    pub const FIRST_ID: u64 = 1;

    /// Create an allocator whose first id is [`Self::FIRST_ID`].
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(Self::FIRST_ID),
        }
    }

    /// Allocate the next id.
    pub fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - Self::FIRST_ID
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
