//! Backlog buffer
//!
//! Size-bounded FIFO of records held while the transport is not connected.
//! Each record is accounted as its estimated in-memory cost plus a fixed
//! per-item overhead. After every push the capacity invariant is
//! re-established by evicting from the head, oldest first; the caller gets
//! the eviction count back for drop accounting.

use std::collections::VecDeque;

use spyglass_protocol::{estimate_size, Record};

/// Fixed accounting overhead per queued item in bytes
pub const ITEM_OVERHEAD: usize = 24;

/// Bounded FIFO of pending records
#[derive(Debug)]
pub struct BacklogQueue {
    items: VecDeque<(Record, usize)>,
    size_bytes: usize,
    capacity_bytes: usize,
}

impl BacklogQueue {
    /// Create a queue bounded to `capacity_bytes`
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            items: VecDeque::new(),
            size_bytes: 0,
            capacity_bytes,
        }
    }

    /// Append a record, evicting oldest records if the capacity is exceeded
    ///
    /// Returns the number of records evicted by this push. A record larger
    /// than the whole capacity is itself evicted immediately.
    pub fn push(&mut self, record: Record) -> usize {
        let cost = estimate_size(&record) + ITEM_OVERHEAD;
        self.items.push_back((record, cost));
        self.size_bytes += cost;
        self.shrink_to_capacity()
    }

    /// Remove and return the oldest record
    pub fn pop(&mut self) -> Option<Record> {
        let (record, cost) = self.items.pop_front()?;
        self.size_bytes -= cost;
        Some(record)
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.items.clear();
        self.size_bytes = 0;
    }

    /// Change the capacity, evicting oldest records to satisfy it
    ///
    /// Returns the number of records evicted.
    pub fn set_capacity(&mut self, capacity_bytes: usize) -> usize {
        self.capacity_bytes = capacity_bytes;
        self.shrink_to_capacity()
    }

    /// Number of queued records
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Accounted size of all queued records
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn shrink_to_capacity(&mut self) -> usize {
        let mut dropped = 0;
        while self.size_bytes > self.capacity_bytes {
            let Some((_, cost)) = self.items.pop_front() else {
                break;
            };
            self.size_bytes -= cost;
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
#[path = "backlog_test.rs"]
mod backlog_test;
