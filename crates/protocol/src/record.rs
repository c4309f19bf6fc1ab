//! Record data model
//!
//! Every datum delivered to the viewer is a [`Record`]: a tagged variant
//! carrying its own wire kind and body fields. Records are plain owned data;
//! the wire layout lives in [`crate::encode`].

use bytes::Bytes;

/// Wire identifier for each record kind (u16 on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordKind {
    ControlCommand = 1,
    LogEntry = 4,
    Watch = 5,
    ProcessFlow = 6,
    Header = 7,
    Stream = 8,
}

/// Severity attached to a log entry
///
/// Carried as producer metadata; the transport core does not inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u32)]
pub enum Level {
    Debug = 0,
    Verbose = 1,
    #[default]
    Message = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

/// Log entry sub-kind (wire `log_entry_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum LogEntryKind {
    Separator = 0,
    EnterMethod = 1,
    LeaveMethod = 2,
    ResetSeparator = 3,
    #[default]
    Message = 100,
    Warning = 101,
    Error = 102,
    InternalError = 103,
    Comment = 104,
    VariableValue = 105,
    Checkpoint = 106,
    Debug = 107,
    Verbose = 108,
    Fatal = 109,
    Conditional = 110,
    Assert = 111,
    Text = 200,
    Binary = 201,
    Graphic = 202,
    Source = 203,
    Object = 204,
    WebContent = 205,
    System = 206,
    MemoryStatistic = 207,
    DatabaseResult = 208,
    DatabaseStructure = 209,
}

/// Viewer that should render a log entry's payload (wire `viewer_id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ViewerId {
    /// No viewer (wire value -1)
    None = 0xFFFF_FFFF,
    #[default]
    Title = 0,
    Data = 1,
    List = 2,
    ValueList = 3,
    Inspector = 4,
    Table = 5,
    Web = 100,
    Binary = 200,
    HtmlSource = 300,
    JavaScriptSource = 301,
    VbScriptSource = 302,
    PerlSource = 303,
    SqlSource = 304,
    IniSource = 305,
    PythonSource = 306,
    XmlSource = 307,
}

/// Watched-value sub-kind (wire `watch_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum WatchKind {
    Char = 0,
    #[default]
    String = 1,
    Integer = 2,
    Float = 3,
    Boolean = 4,
    Address = 5,
    Timestamp = 6,
    Object = 7,
}

/// Process-flow sub-kind (wire `process_flow_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ProcessFlowKind {
    #[default]
    EnterMethod = 0,
    LeaveMethod = 1,
    EnterThread = 2,
    LeaveThread = 3,
    EnterProcess = 4,
    LeaveProcess = 5,
}

/// Control-command sub-kind (wire `control_command_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ControlCommandKind {
    #[default]
    ClearLog = 0,
    ClearWatches = 1,
    ClearAutoViews = 2,
    ClearAll = 3,
    ClearProcessFlow = 4,
}

/// 32-bit RGBA color attached to a log entry
///
/// Serialized as `R | G<<8 | B<<16 | A<<24` (little-endian u32). The default
/// is fully transparent, which viewers render with their own theme color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque color from RGB components
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Pack into the wire representation
    pub const fn to_wire(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }
}

/// Whether a viewer payload is textual or raw binary
///
/// Textual payloads are BOM-prefixed on the wire so the viewer can detect
/// the encoding; binary payloads are emitted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    Text,
    Binary,
}

/// Viewer-context payload carried by a log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerData {
    pub payload: Bytes,
    pub format: DataFormat,
}

impl ViewerData {
    /// Textual payload (BOM-prefixed on the wire)
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            format: DataFormat::Text,
        }
    }

    /// Binary payload (emitted verbatim)
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            format: DataFormat::Binary,
        }
    }
}

/// First record on every connection; conveys app/host/room metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub host_name: String,
    pub app_name: String,
    pub room: String,
}

/// A structured log message
///
/// Absent strings stay empty; the codec writes them with a declared length
/// of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: LogEntryKind,
    pub viewer: ViewerId,
    pub level: Level,
    pub app_name: String,
    pub session_name: String,
    pub title: String,
    pub host_name: String,
    pub data: Option<ViewerData>,
    pub pid: u32,
    pub tid: u32,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub color: Color,
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            kind: LogEntryKind::Message,
            viewer: ViewerId::Title,
            level: Level::Message,
            app_name: String::new(),
            session_name: String::new(),
            title: String::new(),
            host_name: String::new(),
            data: None,
            pid: std::process::id(),
            tid: 0,
            timestamp_ms: crate::timestamp::now_ms(),
            color: Color::default(),
        }
    }
}

/// A named watched value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub name: String,
    pub value: String,
    pub kind: WatchKind,
    pub timestamp_ms: u64,
}

/// A method/thread/process entry or exit marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFlow {
    pub kind: ProcessFlowKind,
    pub title: String,
    pub host_name: String,
    pub pid: u32,
    pub tid: u32,
    pub timestamp_ms: u64,
}

/// An instruction to the viewer (clear log, clear watches, ...)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlCommand {
    pub kind: ControlCommandKind,
    pub data: Option<Bytes>,
}

/// A raw stream datum routed to a named channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub channel: String,
    pub data: Bytes,
    pub content_type: String,
    pub format: DataFormat,
    pub timestamp_ms: u64,
}

/// One serializable datum delivered to the viewer
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Header(Header),
    LogEntry(LogEntry),
    Watch(Watch),
    ProcessFlow(ProcessFlow),
    ControlCommand(ControlCommand),
    Stream(StreamRecord),
}

impl Record {
    /// Wire kind identifier for this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Header(_) => RecordKind::Header,
            Record::LogEntry(_) => RecordKind::LogEntry,
            Record::Watch(_) => RecordKind::Watch,
            Record::ProcessFlow(_) => RecordKind::ProcessFlow,
            Record::ControlCommand(_) => RecordKind::ControlCommand,
            Record::Stream(_) => RecordKind::Stream,
        }
    }

    /// Severity, for log entries; `None` for every other kind
    pub fn level(&self) -> Option<Level> {
        match self {
            Record::LogEntry(entry) => Some(entry.level),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
