//! Client configuration
//!
//! Plain structs with the documented defaults; only specify what you want
//! to change. Deserializable from TOML-style sources and adjustable through
//! builder methods for programmatic use.
//!
//! # Example
//!
//! ```
//! use spyglass_client::ClientConfig;
//!
//! let config = ClientConfig::default()
//!     .with_host("viewer.internal")
//!     .with_app_name("billing");
//! assert_eq!(config.port, 4228);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default viewer TCP port
pub const DEFAULT_PORT: u16 = 4228;

/// Default connect deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default minimum gap between reconnect attempts in milliseconds
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Default queue capacity in KB (both backlog and scheduler)
pub const DEFAULT_QUEUE_KB: u64 = 2_048;

/// Buffering behavior while the transport is not connected
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BacklogConfig {
    /// Buffer records while disconnected
    /// Default: true
    pub enabled: bool,

    /// Backlog capacity in KB
    /// Default: 2048
    pub queue: u64,

    /// Keep the connection open across writes
    /// Default: true
    pub keep_open: bool,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue: DEFAULT_QUEUE_KB,
            keep_open: true,
        }
    }
}

/// Background scheduler behavior (the `async` configuration block)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Route submits through the background scheduler
    /// Default: false
    pub enabled: bool,

    /// Scheduler queue capacity in KB
    /// Default: 2048
    pub queue: u64,

    /// Suspend producers instead of trimming when the queue is full
    /// Default: false
    pub throttle: bool,

    /// Discard queued commands on disconnect
    /// Default: false
    pub clear_on_disconnect: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue: DEFAULT_QUEUE_KB,
            throttle: false,
            clear_on_disconnect: false,
        }
    }
}

/// Connection and delivery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Viewer TCP host
    /// Default: 127.0.0.1
    pub host: String,

    /// Viewer TCP port
    /// Default: 4228
    pub port: u16,

    /// Unix-socket name; resolved under the system temp directory
    /// unless `pipe_path` overrides it. Takes precedence over TCP.
    pub pipe: Option<String>,

    /// Explicit socket path overriding the platform default
    pub pipe_path: Option<PathBuf>,

    /// Connect deadline in milliseconds (covers connect + handshake)
    /// Default: 30000
    pub timeout: u64,

    /// Application name included in the header and log entries
    /// Default: "App"
    pub app_name: String,

    /// Host name included in the header and log entries
    /// Default: the OS hostname
    pub host_name: Option<String>,

    /// Logical log partition included in the header
    /// Default: "default"
    pub room: String,

    /// Enable auto-reconnect
    /// Default: true
    pub reconnect: bool,

    /// Minimum gap between reconnect attempts in milliseconds
    /// Default: 3000
    pub reconnect_interval: u64,

    /// Buffering while disconnected
    pub backlog: BacklogConfig,

    /// Background scheduler (the `async` block)
    #[serde(rename = "async")]
    pub scheduler: SchedulerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            pipe: None,
            pipe_path: None,
            timeout: DEFAULT_TIMEOUT_MS,
            app_name: "App".into(),
            host_name: None,
            room: "default".into(),
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL_MS,
            backlog: BacklogConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the viewer host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the viewer port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect over a Unix socket instead of TCP
    #[must_use]
    pub fn with_pipe(mut self, name: impl Into<String>) -> Self {
        self.pipe = Some(name.into());
        self
    }

    /// Set the connect deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_millis() as u64;
        self
    }

    /// Set the application name
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set the host name (overrides the OS hostname)
    #[must_use]
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    /// Set the log partition
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    /// Enable or disable auto-reconnect
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the minimum gap between reconnect attempts
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval.as_millis() as u64;
        self
    }

    /// Replace the backlog block
    #[must_use]
    pub fn with_backlog(mut self, backlog: BacklogConfig) -> Self {
        self.backlog = backlog;
        self
    }

    /// Replace the scheduler block
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Whether the connection stays open across writes
    ///
    /// Derived: a disabled backlog forces keep-open, otherwise the backlog
    /// block decides.
    pub fn keep_open(&self) -> bool {
        !self.backlog.enabled || self.backlog.keep_open
    }

    /// Connect deadline as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Reconnect gate as a [`Duration`]
    pub fn reconnect_gate(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval)
    }

    /// Backlog capacity in bytes
    pub fn backlog_capacity(&self) -> usize {
        (self.backlog.queue as usize) * 1024
    }

    /// Scheduler queue capacity in bytes
    pub fn scheduler_capacity(&self) -> usize {
        (self.scheduler.queue as usize) * 1024
    }

    /// Host name for the header: the configured override or the OS hostname
    pub fn effective_host_name(&self) -> String {
        if let Some(name) = &self.host_name {
            return name.clone();
        }
        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".into())
    }
}
