//! Global atomic counters for promotion observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. after a batch completes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Relaxed atomic counters, lock-free.
pub struct Metrics {
    requests_sent: AtomicU64,
    requests_failed: AtomicU64,
    students_transitioned: AtomicU64,
    roster_refreshes: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            students_transitioned: AtomicU64::new(0),
            roster_refreshes: AtomicU64::new(0),
        }
    }

    /// Count one transition request sent to the store.
    pub fn inc_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_sent", "counter incremented");
    }

    /// Count one transition request the store rejected or never answered.
    pub fn inc_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_failed", "counter incremented");
    }

    /// Add the number of students an accepted request covered.
    pub fn add_students_transitioned(&self, count: u64) {
        self.students_transitioned
            .fetch_add(count, Ordering::Relaxed);
        tracing::trace!(metric = "students_transitioned", count, "counter incremented");
    }

    /// Count one full roster refresh.
    pub fn inc_roster_refreshes(&self) {
        self.roster_refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "roster_refreshes", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            requests_sent = self.requests_sent(),
            requests_failed = self.requests_failed(),
            students_transitioned = self.students_transitioned(),
            roster_refreshes = self.roster_refreshes(),
        );
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn students_transitioned(&self) -> u64 {
        self.students_transitioned.load(Ordering::Relaxed)
    }

    pub fn roster_refreshes(&self) -> u64 {
        self.roster_refreshes.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.requests_sent.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.students_transitioned.store(0, Ordering::Relaxed);
        self.roster_refreshes.store(0, Ordering::Relaxed);
    }
}
