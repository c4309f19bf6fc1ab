use super::*;
use crate::record::{
    Color, ControlCommandKind, Header, Level, LogEntryKind, ProcessFlowKind, RecordKind,
    StreamRecord, ViewerId, WatchKind,
};

fn u16_at(frame: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([frame[pos], frame[pos + 1]])
}

fn u32_at(frame: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(frame[pos..pos + 4].try_into().unwrap())
}

fn f64_at(frame: &[u8], pos: usize) -> f64 {
    f64::from_le_bytes(frame[pos..pos + 8].try_into().unwrap())
}

/// Kind and declared body size of a frame, asserting the frame is
/// self-consistent.
fn frame_header(frame: &[u8]) -> (u16, usize) {
    let kind = u16_at(frame, 0);
    let body_size = u32_at(frame, 2) as usize;
    assert_eq!(frame.len(), FRAME_HEADER_SIZE + body_size);
    (kind, body_size)
}

// =============================================================================
// Header frames
// =============================================================================

#[test]
fn test_header_frame_layout() {
    let record = Record::Header(Header {
        host_name: "box".into(),
        app_name: "app".into(),
        room: "default".into(),
    });
    let frame = encode(&record);

    let (kind, _) = frame_header(&frame);
    assert_eq!(kind, RecordKind::Header as u16);

    let content_len = u32_at(&frame, 6) as usize;
    let content = std::str::from_utf8(&frame[10..10 + content_len]).unwrap();
    assert_eq!(content, "hostname=box\r\nappname=app\r\nroom=default\r\n");
}

#[test]
fn test_header_empty_fields_still_present() {
    let record = Record::Header(Header::default());
    let frame = encode(&record);

    let content_len = u32_at(&frame, 6) as usize;
    let content = std::str::from_utf8(&frame[10..10 + content_len]).unwrap();
    assert_eq!(content, "hostname=\r\nappname=\r\nroom=\r\n");
}

// =============================================================================
// LogEntry frames
// =============================================================================

#[test]
fn test_log_entry_frame_layout() {
    let record = Record::LogEntry(LogEntry {
        kind: LogEntryKind::Message,
        viewer: ViewerId::Title,
        level: Level::Message,
        app_name: "app".into(),
        session_name: "main".into(),
        title: "hello".into(),
        host_name: "box".into(),
        data: None,
        pid: 1234,
        tid: 5678,
        timestamp_ms: 1_704_067_200_000,
        color: Color {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44,
        },
    });
    let frame = encode(&record);

    let (kind, _) = frame_header(&frame);
    assert_eq!(kind, RecordKind::LogEntry as u16);

    let mut pos = FRAME_HEADER_SIZE;
    assert_eq!(u32_at(&frame, pos), 100); // log_entry_type = Message
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 0); // viewer_id = Title
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 3); // app_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 4); // session_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 5); // title_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 3); // host_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 0); // data_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 1234); // pid
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 5678); // tid
    pos += 4;
    assert_eq!(f64_at(&frame, pos), 45_292.0); // timestamp
    pos += 8;
    assert_eq!(u32_at(&frame, pos), 0x4433_2211); // color
    pos += 4;

    assert_eq!(&frame[pos..pos + 3], b"app");
    assert_eq!(&frame[pos + 3..pos + 7], b"main");
    assert_eq!(&frame[pos + 7..pos + 12], b"hello");
    assert_eq!(&frame[pos + 12..pos + 15], b"box");
    assert_eq!(pos + 15, frame.len());
}

#[test]
fn test_log_entry_text_data_is_bom_prefixed() {
    let record = Record::LogEntry(LogEntry {
        data: Some(ViewerData::text("abc")),
        app_name: String::new(),
        session_name: String::new(),
        title: String::new(),
        host_name: String::new(),
        ..Default::default()
    });
    let frame = encode(&record);

    // data_len is the seventh u32 of the body
    let data_len = u32_at(&frame, FRAME_HEADER_SIZE + 24) as usize;
    assert_eq!(data_len, UTF8_BOM.len() + 3);

    // All strings are empty, so the data sits right after the fixed fields.
    let data_start = frame.len() - data_len;
    assert_eq!(&frame[data_start..data_start + 3], &UTF8_BOM);
    assert_eq!(&frame[data_start + 3..], b"abc");
}

#[test]
fn test_log_entry_binary_data_is_verbatim() {
    let payload = vec![0x00, 0xff, 0x10];
    let record = Record::LogEntry(LogEntry {
        data: Some(ViewerData::binary(payload.clone())),
        app_name: String::new(),
        session_name: String::new(),
        title: String::new(),
        host_name: String::new(),
        ..Default::default()
    });
    let frame = encode(&record);

    let data_len = u32_at(&frame, FRAME_HEADER_SIZE + 24) as usize;
    assert_eq!(data_len, payload.len());
    assert_eq!(&frame[frame.len() - data_len..], &payload[..]);
}

#[test]
fn test_log_entry_viewer_none_is_wire_minus_one() {
    let record = Record::LogEntry(LogEntry {
        viewer: ViewerId::None,
        ..Default::default()
    });
    let frame = encode(&record);
    assert_eq!(u32_at(&frame, FRAME_HEADER_SIZE + 4), 0xFFFF_FFFF);
}

// =============================================================================
// Watch frames
// =============================================================================

#[test]
fn test_watch_frame_layout() {
    let record = Record::Watch(Watch {
        name: "count".into(),
        value: "42".into(),
        kind: WatchKind::Integer,
        timestamp_ms: 0,
    });
    let frame = encode(&record);

    let (kind, body_size) = frame_header(&frame);
    assert_eq!(kind, RecordKind::Watch as u16);
    assert_eq!(body_size, 4 + 4 + 4 + 8 + 5 + 2);

    let mut pos = FRAME_HEADER_SIZE;
    assert_eq!(u32_at(&frame, pos), 5); // name_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 2); // value_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), WatchKind::Integer as u32);
    pos += 4;
    assert_eq!(f64_at(&frame, pos), 25_569.0); // Unix epoch
    pos += 8;
    assert_eq!(&frame[pos..pos + 5], b"count");
    assert_eq!(&frame[pos + 5..pos + 7], b"42");
}

// =============================================================================
// ProcessFlow frames
// =============================================================================

#[test]
fn test_process_flow_frame_layout() {
    let record = Record::ProcessFlow(ProcessFlow {
        kind: ProcessFlowKind::EnterThread,
        title: "worker".into(),
        host_name: "box".into(),
        pid: 9,
        tid: 7,
        timestamp_ms: 0,
    });
    let frame = encode(&record);

    let (kind, body_size) = frame_header(&frame);
    assert_eq!(kind, RecordKind::ProcessFlow as u16);
    assert_eq!(body_size, 4 + 4 + 4 + 4 + 4 + 8 + 6 + 3);

    let mut pos = FRAME_HEADER_SIZE;
    assert_eq!(u32_at(&frame, pos), ProcessFlowKind::EnterThread as u32);
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 6); // title_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 3); // host_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 9); // pid
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 7); // tid
    pos += 4;
    pos += 8; // timestamp
    assert_eq!(&frame[pos..pos + 6], b"worker");
    assert_eq!(&frame[pos + 6..pos + 9], b"box");
}

// =============================================================================
// ControlCommand frames
// =============================================================================

#[test]
fn test_control_command_frame_layout() {
    let record = Record::ControlCommand(ControlCommand {
        kind: ControlCommandKind::ClearAll,
        data: None,
    });
    let frame = encode(&record);

    let (kind, body_size) = frame_header(&frame);
    assert_eq!(kind, RecordKind::ControlCommand as u16);
    assert_eq!(body_size, 8);
    assert_eq!(u32_at(&frame, 6), ControlCommandKind::ClearAll as u32);
    assert_eq!(u32_at(&frame, 10), 0); // data_len
}

#[test]
fn test_control_command_data_is_verbatim() {
    let record = Record::ControlCommand(ControlCommand {
        kind: ControlCommandKind::ClearLog,
        data: Some(vec![1u8, 2, 3, 4].into()),
    });
    let frame = encode(&record);

    assert_eq!(u32_at(&frame, 10), 4);
    assert_eq!(&frame[14..18], &[1, 2, 3, 4]);
}

// =============================================================================
// Stream frames
// =============================================================================

#[test]
fn test_stream_frame_layout() {
    let record = Record::Stream(StreamRecord {
        channel: "metrics".into(),
        data: Bytes::from_static(b"x=1"),
        content_type: "text/plain".into(),
        format: DataFormat::Binary,
        timestamp_ms: 0,
    });
    let frame = encode(&record);

    let (kind, body_size) = frame_header(&frame);
    assert_eq!(kind, RecordKind::Stream as u16);
    assert_eq!(body_size, 4 + 4 + 4 + 8 + 7 + 3 + 10);

    let mut pos = FRAME_HEADER_SIZE;
    assert_eq!(u32_at(&frame, pos), 7); // channel_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 3); // data_len
    pos += 4;
    assert_eq!(u32_at(&frame, pos), 10); // type_len
    pos += 4;
    pos += 8; // timestamp
    assert_eq!(&frame[pos..pos + 7], b"metrics");
    assert_eq!(&frame[pos + 7..pos + 10], b"x=1");
    assert_eq!(&frame[pos + 10..pos + 20], b"text/plain");
}

#[test]
fn test_stream_text_data_is_bom_prefixed() {
    let record = Record::Stream(StreamRecord {
        channel: "c".into(),
        data: Bytes::from_static(b"hi"),
        content_type: String::new(),
        format: DataFormat::Text,
        timestamp_ms: 0,
    });
    let frame = encode(&record);

    let data_len = u32_at(&frame, FRAME_HEADER_SIZE + 4) as usize;
    assert_eq!(data_len, UTF8_BOM.len() + 2);

    let data_start = FRAME_HEADER_SIZE + 12 + 8 + 1;
    assert_eq!(&frame[data_start..data_start + 3], &UTF8_BOM);
    assert_eq!(&frame[data_start + 3..data_start + 5], b"hi");
}

// =============================================================================
// Framing invariants
// =============================================================================

#[test]
fn test_encode_into_appends() {
    let first = Record::Watch(Watch {
        name: "a".into(),
        value: "1".into(),
        kind: WatchKind::String,
        timestamp_ms: 0,
    });
    let second = Record::ControlCommand(ControlCommand::default());

    let mut buf = BytesMut::new();
    encode_into(&first, &mut buf);
    let first_len = buf.len();
    encode_into(&second, &mut buf);

    // Both frames parse back-to-back.
    let (_, body) = {
        let kind = u16_at(&buf, 0);
        (kind, u32_at(&buf, 2) as usize)
    };
    assert_eq!(FRAME_HEADER_SIZE + body, first_len);
    assert_eq!(u16_at(&buf, first_len), RecordKind::ControlCommand as u16);
}

#[test]
fn test_declared_size_matches_for_every_kind() {
    let records = [
        Record::Header(Header::default()),
        Record::LogEntry(LogEntry::default()),
        Record::Watch(Watch {
            name: "n".into(),
            value: "v".into(),
            kind: WatchKind::String,
            timestamp_ms: 1,
        }),
        Record::ProcessFlow(ProcessFlow {
            kind: ProcessFlowKind::EnterMethod,
            title: "t".into(),
            host_name: "h".into(),
            pid: 1,
            tid: 2,
            timestamp_ms: 3,
        }),
        Record::ControlCommand(ControlCommand::default()),
        Record::Stream(StreamRecord {
            channel: "c".into(),
            data: Bytes::from_static(b"d"),
            content_type: "t".into(),
            format: DataFormat::Binary,
            timestamp_ms: 4,
        }),
    ];

    for record in &records {
        let frame = encode(record);
        let (kind, _) = frame_header(&frame);
        assert_eq!(kind, record.kind() as u16);
    }
}
