//! Listener worker metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single listener worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Successful deliveries
    delivered_count: AtomicU64,
    /// Failed delivery attempts (retried or not)
    failure_count: AtomicU64,
    /// Notifications dropped after exhausting their attempts
    dropped_count: AtomicU64,
    /// Notifications moved from the error queue back to the primary queue
    requeued_count: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requeued_count(&self) -> u64 {
        self.requeued_count.load(Ordering::Relaxed)
    }

    pub fn add_requeued_count(&self, count: usize) {
        self.requeued_count.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Point-in-time view of a worker (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub error_queue_len: usize,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub requeued_count: u64,
}
