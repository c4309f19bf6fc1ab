//! Out-of-band observer hooks
//!
//! The core never raises transient transport faults to producers; host
//! applications that want connection telemetry install an observer instead.
//! Every hook defaults to a no-op, so implementors override only what they
//! care about. Hooks are invoked from the core's internal contexts and must
//! not block.

use crate::error::ClientError;

/// Callback surface for connection lifecycle and drop accounting
pub trait ClientObserver: Send + Sync {
    /// The handshake completed; `server_banner` is the line the viewer sent
    /// (including its trailing newline)
    fn on_connect(&self, _server_banner: &str) {}

    /// The connection went away (peer close, write failure, or an explicit
    /// disconnect)
    fn on_disconnect(&self) {}

    /// A connect or write attempt failed
    fn on_error(&self, _error: &ClientError) {}

    /// `count` queued records were evicted by overflow since the last report
    fn on_packet_dropped(&self, _count: usize) {}
}

/// Default observer that ignores everything
pub(crate) struct NullObserver;

impl ClientObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        drops: AtomicUsize,
    }

    impl ClientObserver for Counting {
        fn on_packet_dropped(&self, count: usize) {
            self.drops.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_hooks_are_no_ops() {
        let observer = NullObserver;
        observer.on_connect("banner\n");
        observer.on_disconnect();
        observer.on_packet_dropped(3);
    }

    #[test]
    fn test_override_single_hook() {
        let observer = Counting {
            drops: AtomicUsize::new(0),
        };
        observer.on_packet_dropped(2);
        observer.on_packet_dropped(5);
        observer.on_connect("ignored\n");
        assert_eq!(observer.drops.load(Ordering::Relaxed), 7);
    }
}
