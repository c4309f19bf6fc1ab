//! Wire codec for viewer frames
//!
//! Serializes a [`Record`] into a self-delimited frame:
//!
//! ```text
//! [2 bytes: record kind (little-endian u16)]
//! [4 bytes: body size (little-endian u32)]
//! [N bytes: kind-specific body]
//! ```
//!
//! All integers are little-endian. Strings are UTF-8 byte sequences whose
//! length is declared in a preceding u32 field; an absent string is a
//! declared length of zero with no bytes. Timestamps are the f64 day count
//! of [`crate::timestamp`]. Textual viewer payloads are prefixed with the
//! UTF-8 BOM so the viewer can detect the encoding; binary payloads are
//! emitted verbatim.
//!
//! Encoding is infallible: records own valid UTF-8 and the layouts are
//! flat, so there is nothing to reject.

use bytes::{BufMut, Bytes, BytesMut};

use crate::record::{
    ControlCommand, DataFormat, Header, LogEntry, ProcessFlow, Record, StreamRecord, ViewerData,
    Watch,
};
use crate::timestamp;

/// UTF-8 byte-order mark prepended to textual viewer payloads
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Frame overhead: kind (u16) + body size (u32)
pub const FRAME_HEADER_SIZE: usize = 6;

/// Serialize a record into a complete wire frame
pub fn encode(record: &Record) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + 64);
    encode_into(record, &mut buf);
    buf.freeze()
}

/// Serialize a record into a complete wire frame, appending to `buf`
pub fn encode_into(record: &Record, buf: &mut BytesMut) {
    buf.put_u16_le(record.kind() as u16);

    // Reserve the body size and backfill once the body is written.
    let size_pos = buf.len();
    buf.put_u32_le(0);
    let body_start = buf.len();

    match record {
        Record::Header(header) => encode_header(header, buf),
        Record::LogEntry(entry) => encode_log_entry(entry, buf),
        Record::Watch(watch) => encode_watch(watch, buf),
        Record::ProcessFlow(flow) => encode_process_flow(flow, buf),
        Record::ControlCommand(command) => encode_control_command(command, buf),
        Record::Stream(stream) => encode_stream(stream, buf),
    }

    let body_size = (buf.len() - body_start) as u32;
    buf[size_pos..size_pos + 4].copy_from_slice(&body_size.to_le_bytes());
}

/// `u32 content_len | bytes content`
///
/// The content is a sequence of `key=value\r\n` pairs; `hostname`,
/// `appname`, and `room` are always present.
fn encode_header(header: &Header, buf: &mut BytesMut) {
    let content = format!(
        "hostname={}\r\nappname={}\r\nroom={}\r\n",
        header.host_name, header.app_name, header.room
    );
    buf.put_u32_le(content.len() as u32);
    buf.put_slice(content.as_bytes());
}

/// All length fields first, then the fixed scalars, then the string and
/// payload bytes in declaration order.
fn encode_log_entry(entry: &LogEntry, buf: &mut BytesMut) {
    let data = entry.data.as_ref().map(wire_payload);
    let data_len = data.as_ref().map_or(0, |d| d.len());

    buf.put_u32_le(entry.kind as u32);
    buf.put_u32_le(entry.viewer as u32);
    buf.put_u32_le(entry.app_name.len() as u32);
    buf.put_u32_le(entry.session_name.len() as u32);
    buf.put_u32_le(entry.title.len() as u32);
    buf.put_u32_le(entry.host_name.len() as u32);
    buf.put_u32_le(data_len as u32);
    buf.put_u32_le(entry.pid);
    buf.put_u32_le(entry.tid);
    buf.put_f64_le(timestamp::to_wire(entry.timestamp_ms));
    buf.put_u32_le(entry.color.to_wire());

    buf.put_slice(entry.app_name.as_bytes());
    buf.put_slice(entry.session_name.as_bytes());
    buf.put_slice(entry.title.as_bytes());
    buf.put_slice(entry.host_name.as_bytes());
    if let Some(data) = data {
        buf.put_slice(&data);
    }
}

/// `u32 name_len | u32 value_len | u32 watch_type | f64 timestamp | name | value`
fn encode_watch(watch: &Watch, buf: &mut BytesMut) {
    buf.put_u32_le(watch.name.len() as u32);
    buf.put_u32_le(watch.value.len() as u32);
    buf.put_u32_le(watch.kind as u32);
    buf.put_f64_le(timestamp::to_wire(watch.timestamp_ms));
    buf.put_slice(watch.name.as_bytes());
    buf.put_slice(watch.value.as_bytes());
}

/// `u32 process_flow_type | u32 title_len | u32 host_len | u32 pid | u32 tid
///  | f64 timestamp | title | host`
fn encode_process_flow(flow: &ProcessFlow, buf: &mut BytesMut) {
    buf.put_u32_le(flow.kind as u32);
    buf.put_u32_le(flow.title.len() as u32);
    buf.put_u32_le(flow.host_name.len() as u32);
    buf.put_u32_le(flow.pid);
    buf.put_u32_le(flow.tid);
    buf.put_f64_le(timestamp::to_wire(flow.timestamp_ms));
    buf.put_slice(flow.title.as_bytes());
    buf.put_slice(flow.host_name.as_bytes());
}

/// `u32 control_command_type | u32 data_len | data`
fn encode_control_command(command: &ControlCommand, buf: &mut BytesMut) {
    let data_len = command.data.as_ref().map_or(0, |d| d.len());
    buf.put_u32_le(command.kind as u32);
    buf.put_u32_le(data_len as u32);
    if let Some(data) = &command.data {
        buf.put_slice(data);
    }
}

/// `u32 channel_len | u32 data_len | u32 type_len | f64 timestamp
///  | channel | data | type`
fn encode_stream(stream: &StreamRecord, buf: &mut BytesMut) {
    let data = payload_bytes(&stream.data, stream.format);
    buf.put_u32_le(stream.channel.len() as u32);
    buf.put_u32_le(data.len() as u32);
    buf.put_u32_le(stream.content_type.len() as u32);
    buf.put_f64_le(timestamp::to_wire(stream.timestamp_ms));
    buf.put_slice(stream.channel.as_bytes());
    buf.put_slice(&data);
    buf.put_slice(stream.content_type.as_bytes());
}

fn wire_payload(data: &ViewerData) -> Bytes {
    payload_bytes(&data.payload, data.format)
}

fn payload_bytes(payload: &Bytes, format: DataFormat) -> Bytes {
    match format {
        DataFormat::Binary => payload.clone(),
        DataFormat::Text => {
            let mut out = BytesMut::with_capacity(UTF8_BOM.len() + payload.len());
            out.put_slice(&UTF8_BOM);
            out.put_slice(payload);
            out.freeze()
        }
    }
}

#[cfg(test)]
#[path = "encode_test.rs"]
mod encode_test;
