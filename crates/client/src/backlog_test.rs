use super::*;
use spyglass_protocol::{LogEntry, BASE_RECORD_COST};

/// A record whose estimated cost is `BASE_RECORD_COST + title_len`
fn record_with_title(title: &str) -> Record {
    Record::LogEntry(LogEntry {
        title: title.into(),
        ..Default::default()
    })
}

fn titled(record: &Record) -> &str {
    match record {
        Record::LogEntry(entry) => &entry.title,
        _ => panic!("expected a log entry"),
    }
}

/// Accounted cost of one empty-titled record
const UNIT: usize = BASE_RECORD_COST + ITEM_OVERHEAD;

// =============================================================================
// FIFO behavior
// =============================================================================

#[test]
fn test_pop_returns_push_order() {
    let mut queue = BacklogQueue::new(1024 * 1024);
    queue.push(record_with_title("a"));
    queue.push(record_with_title("b"));
    queue.push(record_with_title("c"));

    assert_eq!(titled(&queue.pop().unwrap()), "a");
    assert_eq!(titled(&queue.pop().unwrap()), "b");
    assert_eq!(titled(&queue.pop().unwrap()), "c");
    assert!(queue.pop().is_none());
}

#[test]
fn test_size_accounting() {
    let mut queue = BacklogQueue::new(1024 * 1024);
    assert_eq!(queue.size_bytes(), 0);

    queue.push(record_with_title(""));
    assert_eq!(queue.size_bytes(), UNIT);
    assert_eq!(queue.count(), 1);

    queue.push(record_with_title("xyz"));
    assert_eq!(queue.size_bytes(), UNIT * 2 + 3);

    queue.pop();
    assert_eq!(queue.size_bytes(), UNIT + 3);

    queue.clear();
    assert_eq!(queue.size_bytes(), 0);
    assert!(queue.is_empty());
}

// =============================================================================
// Overflow eviction
// =============================================================================

#[test]
fn test_push_evicts_oldest_first() {
    // Each one-char record costs UNIT + 1, so the third push overflows
    // and evicts the first.
    let mut queue = BacklogQueue::new(UNIT * 3);
    for title in ["a", "b", "c"] {
        queue.push(record_with_title(title));
    }

    assert_eq!(queue.count(), 2);
    assert_eq!(titled(&queue.pop().unwrap()), "b");
    assert_eq!(titled(&queue.pop().unwrap()), "c");
}

#[test]
fn test_push_reports_eviction_count() {
    let mut queue = BacklogQueue::new(UNIT * 2);
    assert_eq!(queue.push(record_with_title("")), 0);
    assert_eq!(queue.push(record_with_title("")), 0);

    // A record costing exactly the full capacity evicts both predecessors
    // and stays.
    let big = record_with_title(&"x".repeat(UNIT * 2 - BASE_RECORD_COST - ITEM_OVERHEAD));
    assert_eq!(queue.push(big), 2);
    assert_eq!(queue.count(), 1);
    assert_eq!(queue.size_bytes(), UNIT * 2);
}

#[test]
fn test_eviction_frees_at_least_the_overflow() {
    let capacity = UNIT * 4;
    let mut queue = BacklogQueue::new(capacity);
    for _ in 0..4 {
        queue.push(record_with_title(""));
    }
    assert_eq!(queue.size_bytes(), capacity);

    // The queue was already full, so the whole cost of the new record is
    // overflow; eviction must free at least that much.
    let overflow = UNIT + 9;
    let dropped = queue.push(record_with_title(&"x".repeat(9)));
    assert_eq!(dropped, 2);
    assert_eq!(queue.count(), 3);
    assert!(dropped * UNIT >= overflow);
    assert!(queue.size_bytes() <= capacity);
}

#[test]
fn test_oversized_record_is_dropped_immediately() {
    let mut queue = BacklogQueue::new(UNIT);
    let dropped = queue.push(record_with_title(&"x".repeat(UNIT * 2)));
    assert_eq!(dropped, 1);
    assert!(queue.is_empty());
    assert_eq!(queue.size_bytes(), 0);
}

// =============================================================================
// Capacity changes
// =============================================================================

#[test]
fn test_set_capacity_evicts_to_fit() {
    let mut queue = BacklogQueue::new(UNIT * 4);
    for title in ["a", "b", "c"] {
        queue.push(record_with_title(title));
    }
    assert_eq!(queue.count(), 3);

    let dropped = queue.set_capacity(UNIT + 1);
    assert_eq!(dropped, 2);
    assert_eq!(titled(&queue.pop().unwrap()), "c");
}

#[test]
fn test_set_capacity_larger_keeps_everything() {
    let mut queue = BacklogQueue::new(UNIT * 2);
    queue.push(record_with_title(""));
    assert_eq!(queue.set_capacity(UNIT * 10), 0);
    assert_eq!(queue.count(), 1);
}

#[test]
fn test_zero_capacity_accepts_nothing() {
    let mut queue = BacklogQueue::new(0);
    assert_eq!(queue.push(record_with_title("")), 1);
    assert!(queue.is_empty());
}
