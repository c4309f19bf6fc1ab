//! In-memory size estimation for queue accounting
//!
//! The backlog and command queues are byte-bounded. They account each
//! record with a conservative estimate: a fixed base plus the byte lengths
//! of its strings and any inlined payload. The estimate deliberately does
//! not track the wire size; it only needs to be stable and roughly
//! proportional to memory cost.

use crate::record::Record;

/// Fixed per-record base cost in bytes
pub const BASE_RECORD_COST: usize = 64;

/// Estimate the in-memory cost of a record in bytes
pub fn estimate_size(record: &Record) -> usize {
    let variable = match record {
        Record::Header(header) => {
            header.host_name.len() + header.app_name.len() + header.room.len()
        }
        Record::LogEntry(entry) => {
            entry.app_name.len()
                + entry.session_name.len()
                + entry.title.len()
                + entry.host_name.len()
                + entry.data.as_ref().map_or(0, |d| d.payload.len())
        }
        Record::Watch(watch) => watch.name.len() + watch.value.len(),
        Record::ProcessFlow(flow) => flow.title.len() + flow.host_name.len(),
        Record::ControlCommand(command) => command.data.as_ref().map_or(0, |d| d.len()),
        Record::Stream(stream) => {
            stream.channel.len() + stream.data.len() + stream.content_type.len()
        }
    };
    BASE_RECORD_COST + variable
}
