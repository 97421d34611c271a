use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregates per-batch insert outcomes across every insertion worker in a
/// restore run, the same plain `Arc<AtomicU64>` pattern the teacher's
/// store benchmark uses for concurrently-updated counters shared across
/// `thread::scope` workers.
#[derive(Default)]
pub struct RunCounters {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful `bulk_insert` batch of `n` documents.
    pub fn add_successes(&self, n: u64) {
        self.successes.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one duplicate-key-tolerated batch of `n` documents the
    /// server rejected while the run continued.
    pub fn add_failures(&self, n: u64) {
        self.failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (self.successes.load(Ordering::Relaxed), self.failures.load(Ordering::Relaxed))
    }
}
