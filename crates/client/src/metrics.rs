//! Client metrics
//!
//! Lock-free counters updated from the submit path and the background
//! tasks. `snapshot()` returns a point-in-time copy for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one client instance
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Records handed to `submit`
    pub records_submitted: AtomicU64,

    /// Records written to the wire (header records included)
    pub records_written: AtomicU64,

    /// Records dropped by policy or queue overflow
    pub records_dropped: AtomicU64,

    /// Frame bytes written to the wire
    pub bytes_written: AtomicU64,

    /// Successful connects (handshake completed)
    pub connects: AtomicU64,

    /// Failed connect attempts
    pub connect_failures: AtomicU64,

    /// Write failures on an established connection
    pub write_errors: AtomicU64,
}

impl ClientMetrics {
    pub const fn new() -> Self {
        Self {
            records_submitted: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_submitted(&self) {
        self.records_submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_written(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn records_dropped(&self, count: u64) {
        self.records_dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connect_ok(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connect_failed(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_submitted: self.records_submitted.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of client metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_submitted: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub bytes_written: u64,
    pub connects: u64,
    pub connect_failures: u64,
    pub write_errors: u64,
}
