//! Spyglass client transport core
//!
//! Delivers structured records from an application process to a remote
//! viewer console over the length-prefixed protocol of
//! [`spyglass_protocol`], across TCP or a Unix socket.
//!
//! The value of this crate is not record formatting (producers hand in
//! ready-made [`Record`](spyglass_protocol::Record)s) but the transport
//! behavior around them:
//!
//! - **Fire-and-forget connect.** [`Client::connect`] returns immediately;
//!   records submitted before the handshake completes are buffered and
//!   flushed, in order, behind the header record.
//! - **Buffering while disconnected.** A size-bounded backlog absorbs
//!   records whenever the viewer is unreachable, dropping oldest-first on
//!   overflow with exact drop accounting.
//! - **Auto-reconnect.** Single-flight, time-gated reconnect attempts; a
//!   successful reconnect drains the backlog before anything newer.
//! - **Optional background scheduler.** With `async.enabled`, submits
//!   enqueue commands drained by one background executor, optionally
//!   throttling producers when the queue is full.
//!
//! Transient transport faults never reach producers; install a
//! [`ClientObserver`] to see them.
//!
//! # Example
//!
//! ```ignore
//! use spyglass_client::{Client, ClientConfig};
//! use spyglass_protocol::{LogEntry, Record};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new(
//!         ClientConfig::default()
//!             .with_host("127.0.0.1")
//!             .with_app_name("worker"),
//!     );
//!
//!     client.connect();
//!     client.submit(Record::LogEntry(LogEntry {
//!         title: "started".into(),
//!         ..Default::default()
//!     }));
//!     client.disconnect().await;
//! }
//! ```

mod backlog;
mod client;
mod command;
mod config;
mod error;
mod metrics;
mod observer;
mod scheduler;
mod transport;

pub use backlog::{BacklogQueue, ITEM_OVERHEAD};
pub use client::{Client, ClientStats, ConnectionPhase};
pub use command::DispatchTask;
pub use config::{
    BacklogConfig, ClientConfig, SchedulerConfig, DEFAULT_PORT, DEFAULT_QUEUE_KB,
    DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_TIMEOUT_MS,
};
pub use error::ClientError;
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use observer::ClientObserver;
