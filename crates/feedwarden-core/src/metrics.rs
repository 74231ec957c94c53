//! Global atomic counters for engine observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on unload).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pages_emitted: AtomicU64,
    items_classified: AtomicU64,
    stale_dropped: AtomicU64,
    classification_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            pages_emitted: AtomicU64::new(0),
            items_classified: AtomicU64::new(0),
            stale_dropped: AtomicU64::new(0),
            classification_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_pages_emitted(&self) {
        self.pages_emitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pages_emitted", "counter incremented");
    }

    /// Add the number of items whose outcomes were applied.
    pub fn add_items_classified(&self, n: u64) {
        self.items_classified.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "items_classified", n, "counter incremented");
    }

    pub fn inc_stale_dropped(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stale_dropped", "counter incremented");
    }

    pub fn inc_classification_failures(&self) {
        self.classification_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "classification_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            pages_emitted = self.pages_emitted(),
            items_classified = self.items_classified(),
            stale_dropped = self.stale_dropped(),
            classification_failures = self.classification_failures(),
        );
    }

    pub fn pages_emitted(&self) -> u64 {
        self.pages_emitted.load(Ordering::Relaxed)
    }

    pub fn items_classified(&self) -> u64 {
        self.items_classified.load(Ordering::Relaxed)
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped.load(Ordering::Relaxed)
    }

    pub fn classification_failures(&self) -> u64 {
        self.classification_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.pages_emitted.store(0, Ordering::Relaxed);
        self.items_classified.store(0, Ordering::Relaxed);
        self.stale_dropped.store(0, Ordering::Relaxed);
        self.classification_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_pages_emitted();
        m.inc_pages_emitted();
        assert_eq!(m.pages_emitted(), 2);

        m.add_items_classified(20);
        assert_eq!(m.items_classified(), 20);

        m.inc_stale_dropped();
        m.inc_classification_failures();
        assert_eq!(m.stale_dropped(), 1);
        assert_eq!(m.classification_failures(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_pages_emitted();
        m.add_items_classified(3);
        m.inc_stale_dropped();
        m.reset();
        assert_eq!(m.pages_emitted(), 0);
        assert_eq!(m.items_classified(), 0);
        assert_eq!(m.stale_dropped(), 0);
    }
}
