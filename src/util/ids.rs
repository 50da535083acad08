//! Identifier types and the per-controller id generator.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a resource manager, unique within one controller.
pub type Guid = u64;

/// Identity of a scheduled task.
pub type TaskId = u64;

/// Identity of a deployment group.
pub type GroupId = u64;

/// Monotonic id source. Each controller owns its own instances, so two
/// controllers in the same process never hand out colliding ids.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first id is `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
