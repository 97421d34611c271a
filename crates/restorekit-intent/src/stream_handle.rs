use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque reference to an externally-owned stream (a data reader or a
/// metadata sidecar reader).
///
/// `Intent` never owns the reader it refers to — it only carries identity,
/// so intents stay plain data and the
/// archive demultiplexer or directory planner can hand readers out (and
/// take them back) without fighting the borrow checker over who owns what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}
