use std::sync::atomic::{AtomicU64, Ordering};

/// Time-derived ids that stay strictly increasing even when two entries are
/// created within the same millisecond.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    last: AtomicU64,
}

impl MonotonicIds {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns `max(now_ms, previous + 1)`.
    pub fn next(&self, now_ms: u64) -> u64 {
        let mut issued = now_ms;
        // fetch_update only fails when the closure returns None, which it never does.
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now_ms.max(last + 1);
                Some(issued)
            });
        issued
    }
}
