//! Spyglass wire protocol
//!
//! Record model and binary codec for the length-prefixed viewer protocol.
//! This crate is pure data and serialization; connection management,
//! buffering, and scheduling live in `spyglass-client`.
//!
//! # Wire Format
//!
//! Each record travels as a self-delimited frame:
//!
//! ```text
//! [2 bytes: record kind (little-endian u16)]
//! [4 bytes: body size (little-endian u32)]
//! [N bytes: kind-specific body]
//! ```
//!
//! Body layouts are documented per kind in [`encode`].
//!
//! # Example
//!
//! ```
//! use spyglass_protocol::{encode, LogEntry, Record};
//!
//! let record = Record::LogEntry(LogEntry {
//!     title: "cache warmed".into(),
//!     app_name: "worker".into(),
//!     ..Default::default()
//! });
//!
//! let frame = encode::encode(&record);
//! assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 4); // LogEntry
//! ```

pub mod encode;
pub mod estimate;
mod record;
pub mod timestamp;

pub use estimate::{estimate_size, BASE_RECORD_COST};
pub use record::{
    Color, ControlCommand, ControlCommandKind, DataFormat, Header, Level, LogEntry, LogEntryKind,
    ProcessFlow, ProcessFlowKind, Record, RecordKind, StreamRecord, ViewerData, ViewerId, Watch,
    WatchKind,
};
