use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters collected while a traversal runs
#[derive(Debug, Default)]
pub struct TraversalMetrics {
    // Directory listing
    directories_listed: AtomicU64,
    transient_faults: AtomicU64,
    other_faults: AtomicU64,

    // Delivery
    batches_delivered: AtomicU64,
    entries_delivered: AtomicU64,

    // Deferred callbacks
    callbacks_dispatched: AtomicU64,
    callbacks_skipped: AtomicU64,
    callbacks_failed: AtomicU64,
}

impl TraversalMetrics {
    /// Creates a new TraversalMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one listing of child directories
    pub fn record_directory(&self) {
        self.directories_listed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a subtree skipped because of an access fault
    pub fn record_transient_fault(&self) {
        self.transient_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a subtree skipped because of any other I/O error
    pub fn record_other_fault(&self) {
        self.other_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a batch handed to the result sink
    pub fn record_batch(&self, entries: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.entries_delivered
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_callback_dispatched(&self) {
        self.callbacks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a deferred callback dropped because the search was canceled
    pub fn record_callback_skipped(&self) {
        self.callbacks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_failed(&self) {
        self.callbacks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> TraversalStats {
        TraversalStats {
            directories_listed: self.directories_listed.load(Ordering::Relaxed),
            transient_faults: self.transient_faults.load(Ordering::Relaxed),
            other_faults: self.other_faults.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            entries_delivered: self.entries_delivered.load(Ordering::Relaxed),
            callbacks_dispatched: self.callbacks_dispatched.load(Ordering::Relaxed),
            callbacks_skipped: self.callbacks_skipped.load(Ordering::Relaxed),
            callbacks_failed: self.callbacks_failed.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Traversal stats:\n\
             Directories listed: {}\n\
             Skipped subtrees (transient/other): {}/{}\n\
             Batches delivered: {} ({} entries)\n\
             Deferred callbacks (dispatched/skipped/failed): {}/{}/{}",
            stats.directories_listed,
            stats.transient_faults,
            stats.other_faults,
            stats.batches_delivered,
            stats.entries_delivered,
            stats.callbacks_dispatched,
            stats.callbacks_skipped,
            stats.callbacks_failed
        );
    }
}

/// Point-in-time copy of [`TraversalMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub directories_listed: u64,
    pub transient_faults: u64,
    pub other_faults: u64,
    pub batches_delivered: u64,
    pub entries_delivered: u64,
    pub callbacks_dispatched: u64,
    pub callbacks_skipped: u64,
    pub callbacks_failed: u64,
}
