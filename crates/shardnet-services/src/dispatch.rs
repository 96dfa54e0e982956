//! Round-robin target selection, shared by Client (dispatch across
//! upstreams) and Central (dispatch across downstreams).

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the next target: `targets[i % targets.len()]`, advancing the
    /// cursor on every call. Panics if `targets` is empty.
    pub fn next<'a, T>(&self, targets: &'a [T]) -> &'a T {
        assert!(!targets.is_empty(), "round robin requires at least one target");
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &targets[i % targets.len()]
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}
