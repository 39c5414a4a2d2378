use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing API activity.
#[derive(Default)]
pub struct ServiceMetrics {
    students_created: AtomicU64,
    students_updated: AtomicU64,
    students_deleted: AtomicU64,
    summaries_generated: AtomicU64,
    summaries_failed: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful create.
    pub fn record_created(&self) {
        self.students_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful update.
    pub fn record_updated(&self) {
        self.students_updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful delete.
    pub fn record_deleted(&self) {
        self.students_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one summary request.
    pub fn record_summary(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.summaries_generated
        } else {
            &self.summaries_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            students_created: self.students_created.load(Ordering::Relaxed),
            students_updated: self.students_updated.load(Ordering::Relaxed),
            students_deleted: self.students_deleted.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            summaries_failed: self.summaries_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of API counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Students created since startup.
    pub students_created: u64,
    /// Students updated since startup.
    pub students_updated: u64,
    /// Students deleted since startup.
    pub students_deleted: u64,
    /// Summaries returned successfully.
    pub summaries_generated: u64,
    /// Summary requests that failed upstream or while streaming.
    pub summaries_failed: u64,
}
