//! Connection core
//!
//! Owns the connection state machine and everything that keeps records
//! flowing across it: the single-flight connect, buffering while
//! disconnected, time-gated reconnects, the flush on (re)connect, and the
//! graceful teardown. Producers talk to a cheap-to-clone [`Client`] handle;
//! all I/O happens on background tasks.
//!
//! # Design
//!
//! - One writer task per connection, fed by an ordered frame channel. The
//!   header and any backlogged records are pushed into the channel while
//!   the state lock is held, so nothing submitted afterwards can overtake
//!   them.
//! - `submit` never suspends: it either hands a frame to the writer channel
//!   or appends to the backlog, both synchronously under the state lock.
//! - Every connection carries a generation number. Teardown paths bump it;
//!   stale tasks compare generations and stand down, which makes
//!   disconnect/reconnect races harmless.
//! - Transient transport faults never propagate to producers; they flip the
//!   state machine and surface through the observer.
//!
//! # Example
//!
//! ```ignore
//! use spyglass_client::{Client, ClientConfig};
//! use spyglass_protocol::{LogEntry, Record};
//!
//! let client = Client::new(ClientConfig::default().with_app_name("worker"));
//! client.connect();
//! client.submit(Record::LogEntry(LogEntry {
//!     title: "started".into(),
//!     ..Default::default()
//! }));
//! client.disconnect().await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use spyglass_protocol::{encode, Header, Record};

use crate::backlog::BacklogQueue;
use crate::command::{Command, DispatchTask};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::observer::{ClientObserver, NullObserver};
use crate::scheduler::Scheduler;
use crate::transport::{Endpoint, FrameWriter, Transport};

/// Safety timer bounding the graceful end-of-stream on close
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Connection state as seen by producers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Queue depth snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub backlog_count: usize,
    pub backlog_bytes: usize,
    pub scheduler_count: usize,
    pub scheduler_bytes: usize,
}

/// Handle to one viewer connection
///
/// Cheap to clone; all clones share the same connection, backlog, and
/// scheduler. Requires a Tokio runtime: `connect`, `submit`, and the
/// internal reconnect paths spawn background tasks.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Create a client with the default (ignoring) observer
    pub fn new(config: ClientConfig) -> Self {
        Self::with_observer(config, Arc::new(NullObserver))
    }

    /// Create a client with an observer for connection telemetry
    pub fn with_observer(config: ClientConfig, observer: Arc<dyn ClientObserver>) -> Self {
        let endpoint = Endpoint::from_config(&config);
        let scheduler = config
            .scheduler
            .enabled
            .then(|| Scheduler::new(config.scheduler_capacity(), config.scheduler.throttle));
        let backlog = BacklogQueue::new(config.backlog_capacity());

        Self {
            shared: Arc::new(Shared {
                config,
                endpoint,
                observer,
                metrics: ClientMetrics::new(),
                scheduler,
                state: Mutex::new(CoreState {
                    phase: ConnectionPhase::Disconnected,
                    failed: false,
                    gate: None,
                    generation: 0,
                    backlog,
                    writer: None,
                    connect_done: None,
                    reconnect_timer_generation: None,
                }),
            }),
        }
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Whether the handshake has completed and the connection is up
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().phase == ConnectionPhase::Connected
    }

    /// Whether the last connect or write attempt failed
    pub fn is_failed(&self) -> bool {
        self.shared.state.lock().failed
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        self.shared.state.lock().phase
    }

    /// Point-in-time counter snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Queue depths
    pub fn stats(&self) -> ClientStats {
        let (backlog_count, backlog_bytes) = {
            let state = self.shared.state.lock();
            (state.backlog.count(), state.backlog.size_bytes())
        };
        let (scheduler_count, scheduler_bytes) = self
            .shared
            .scheduler
            .as_ref()
            .map_or((0, 0), |s| (s.count(), s.size_bytes()));
        ClientStats {
            backlog_count,
            backlog_bytes,
            scheduler_count,
            scheduler_bytes,
        }
    }

    /// Start connecting; fire-and-forget
    ///
    /// Returns immediately. Records may be submitted right away: while the
    /// handshake is in flight they are buffered and flushed, in order,
    /// behind the header once the connection is up. Concurrent calls join
    /// the in-flight attempt instead of opening a second socket.
    pub fn connect(&self) {
        if let Some(scheduler) = &self.shared.scheduler {
            scheduler.start(Arc::clone(&self.shared));
            if scheduler.schedule(Command::Connect).is_none() {
                tracing::debug!("connect ignored: scheduler stopped");
            }
            return;
        }
        self.shared.start_connect();
    }

    /// Accept a record for delivery; never blocks on I/O
    ///
    /// Connected: the record is framed and handed to the writer in
    /// submission order. Otherwise it is buffered (or dropped, if
    /// reconnect or the backlog is disabled) before this call returns.
    pub fn submit(&self, record: Record) {
        self.shared.metrics.record_submitted();

        if let Some(scheduler) = &self.shared.scheduler {
            match scheduler.schedule(Command::Write(record)) {
                Some(trimmed) if trimmed > 0 => {
                    self.shared.metrics.records_dropped(trimmed as u64);
                    self.shared.observer.on_packet_dropped(trimmed);
                }
                Some(_) => {}
                None => {
                    self.shared.metrics.records_dropped(1);
                    tracing::trace!("record dropped: scheduler stopped");
                }
            }
            return;
        }

        self.shared.submit_record(record);
    }

    /// Like [`submit`](Self::submit), but in throttled async mode the call
    /// suspends until the scheduler queue has room
    ///
    /// Returns false if the record was refused (scheduler stopped while
    /// waiting). Waiters resume in FIFO order as space frees. Without a
    /// throttled scheduler this behaves exactly like `submit`.
    pub async fn submit_with_backpressure(&self, record: Record) -> bool {
        self.shared.metrics.record_submitted();

        let Some(scheduler) = &self.shared.scheduler else {
            self.shared.submit_record(record);
            return true;
        };

        let core_failed = self.shared.state.lock().failed;
        match scheduler
            .schedule_with_backpressure(Command::Write(record), core_failed)
            .await
        {
            Some(trimmed) => {
                if trimmed > 0 {
                    self.shared.metrics.records_dropped(trimmed as u64);
                    self.shared.observer.on_packet_dropped(trimmed);
                }
                true
            }
            None => {
                self.shared.metrics.records_dropped(1);
                false
            }
        }
    }

    /// Run a task on the scheduler context
    ///
    /// Ordered with respect to queued writes. Without a scheduler the task
    /// runs inline.
    pub fn dispatch(&self, task: DispatchTask) {
        match &self.shared.scheduler {
            Some(scheduler) => {
                if scheduler.schedule(Command::Dispatch(task)).is_none() {
                    tracing::trace!("dispatch dropped: scheduler stopped");
                }
            }
            None => task(),
        }
    }

    /// Close the connection
    ///
    /// Sync mode: pending frames drain, then the stream ends gracefully
    /// (bounded by a 5 s safety timer before the socket is destroyed).
    /// Async mode: optionally clears queued commands
    /// (`async.clear_on_disconnect`), enqueues the disconnect, and waits
    /// for the scheduler to drain. Idempotent; calling again on a dead
    /// connection returns promptly.
    pub async fn disconnect(&self) {
        if let Some(scheduler) = &self.shared.scheduler {
            // The drain below needs the executor; starting it is idempotent.
            scheduler.start(Arc::clone(&self.shared));
            if self.shared.config.scheduler.clear_on_disconnect {
                let discarded = scheduler.clear();
                if discarded > 0 {
                    self.shared.metrics.records_dropped(discarded as u64);
                }
            }
            if scheduler.schedule(Command::Disconnect).is_none() {
                // Scheduler already stopped; close the connection directly.
                self.shared.shutdown_connection().await;
                return;
            }
            scheduler.wait_drained().await;
            return;
        }
        self.shared.shutdown_connection().await;
    }

    /// Stop the background scheduler (async mode)
    ///
    /// Throttled producers are released with a refusal, then only pending
    /// disconnect commands are drained; queued writes and connects are
    /// discarded. No-op in sync mode.
    pub async fn stop(&self) {
        if let Some(scheduler) = &self.shared.scheduler {
            scheduler.stop(&self.shared).await;
        }
    }
}

struct WriterHandle {
    frames: mpsc::UnboundedSender<bytes::Bytes>,
    done: Option<oneshot::Receiver<()>>,
    cancel: CancellationToken,
    generation: u64,
}

struct CoreState {
    phase: ConnectionPhase,
    /// Sticky "last attempt failed" flag
    failed: bool,
    /// When the last attempt failed; gates the next one
    gate: Option<Instant>,
    /// Bumped by every teardown; stale tasks compare and stand down
    generation: u64,
    backlog: BacklogQueue,
    writer: Option<WriterHandle>,
    /// In-flight connect attempt; concurrent requests join it
    connect_done: Option<watch::Receiver<bool>>,
    /// Armed delayed reconnect, tagged with the generation that armed it
    reconnect_timer_generation: Option<u64>,
}

pub(crate) struct Shared {
    config: ClientConfig,
    endpoint: Endpoint,
    observer: Arc<dyn ClientObserver>,
    pub(crate) metrics: ClientMetrics,
    scheduler: Option<Scheduler>,
    state: Mutex<CoreState>,
}

impl Shared {
    fn header_record(&self) -> Record {
        Record::Header(Header {
            host_name: self.config.effective_host_name(),
            app_name: self.config.app_name.clone(),
            room: self.config.room.clone(),
        })
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.state.lock().failed
    }

    // -------------------------------------------------------------------
    // Submit path
    // -------------------------------------------------------------------

    /// State-based submit: forward when connected, otherwise buffer or drop
    ///
    /// The queue append happens before this returns; a connect completing
    /// concurrently can never flush past a record that was already
    /// accepted.
    pub(crate) fn submit_record(self: &Arc<Self>, record: Record) {
        let evicted = {
            let mut state = self.state.lock();

            if state.phase == ConnectionPhase::Connected {
                if let Some(writer) = &state.writer {
                    let frame = encode::encode(&record);
                    if writer.frames.send(frame).is_ok() {
                        if !self.config.keep_open() {
                            Self::close_after_write(&mut state);
                        }
                        return;
                    }
                }
                // Writer raced away beneath us; fall through to buffering.
            }

            self.buffer_or_drop(&mut state, record)
        };

        if evicted > 0 {
            self.metrics.records_dropped(evicted as u64);
            self.observer.on_packet_dropped(evicted);
        }
    }

    /// Disconnected-state policy; returns the number of evicted records
    fn buffer_or_drop(self: &Arc<Self>, state: &mut CoreState, record: Record) -> usize {
        if !self.config.reconnect {
            self.metrics.records_dropped(1);
            tracing::trace!("record dropped: reconnect disabled");
            return 0;
        }
        if !self.config.backlog.enabled {
            self.metrics.records_dropped(1);
            tracing::trace!("record dropped: backlog disabled");
            return 0;
        }

        let evicted = state.backlog.push(record);

        if self.config.keep_open() {
            self.maybe_reconnect(state);
        }
        evicted
    }

    /// keep_open = false: the connection closes right after the write
    fn close_after_write(state: &mut CoreState) {
        state.generation += 1;
        state.phase = ConnectionPhase::Disconnected;
        // Dropping the handle closes the frame channel; the writer task
        // drains what is queued, ends the stream, and exits.
        state.writer = None;
    }

    // -------------------------------------------------------------------
    // Connect path
    // -------------------------------------------------------------------

    /// Explicit connect: ungated, single-flight
    pub(crate) fn start_connect(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.gate = None;
        state.reconnect_timer_generation = None;
        self.spawn_connect(&mut state);
    }

    /// Spawn the connect task unless one is already in flight
    fn spawn_connect(self: &Arc<Self>, state: &mut CoreState) {
        if state.phase != ConnectionPhase::Disconnected || state.connect_done.is_some() {
            return;
        }
        state.phase = ConnectionPhase::Connecting;
        let (done_tx, done_rx) = watch::channel(false);
        state.connect_done = Some(done_rx);

        let shared = Arc::clone(self);
        let generation = state.generation;
        tokio::spawn(async move {
            shared.run_connect(generation, done_tx).await;
        });
    }

    /// Reconnect driver for disconnected submits: attempt now if the gate
    /// allows it, otherwise arm a one-shot timer for when it does
    fn maybe_reconnect(self: &Arc<Self>, state: &mut CoreState) {
        if state.phase != ConnectionPhase::Disconnected || state.connect_done.is_some() {
            return;
        }
        match state.gate {
            Some(failed_at) if failed_at.elapsed() < self.config.reconnect_gate() => {
                self.arm_reconnect_timer(state);
            }
            _ => self.spawn_connect(state),
        }
    }

    fn arm_reconnect_timer(self: &Arc<Self>, state: &mut CoreState) {
        if state.reconnect_timer_generation.is_some() {
            return;
        }
        let generation = state.generation;
        state.reconnect_timer_generation = Some(generation);

        let delay = state.gate.map_or(Duration::ZERO, |failed_at| {
            self.config.reconnect_gate().saturating_sub(failed_at.elapsed())
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = shared.state.lock();
            if state.reconnect_timer_generation != Some(generation) {
                return; // disarmed by a disconnect
            }
            state.reconnect_timer_generation = None;
            shared.spawn_connect(&mut state);
        });
    }

    async fn run_connect(self: Arc<Self>, generation: u64, done: watch::Sender<bool>) {
        match Transport::connect(&self.endpoint, self.config.connect_timeout()).await {
            Ok(transport) => self.install_connection(generation, transport),
            Err(error) => self.fail_connect(generation, error),
        }
        let _ = done.send(true);
    }

    /// Connecting -> Connected: prime the writer with the header and the
    /// drained backlog before anything else can observe the new state
    fn install_connection(self: &Arc<Self>, generation: u64, transport: Transport) {
        tracing::trace!(banner = %transport.server_banner().trim_end(), "handshake complete");
        let (writer, reader, banner) = transport.into_parts();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                // A disconnect superseded this attempt; dropping the halves
                // closes the socket.
                return;
            }
            state.connect_done = None;
            state.phase = ConnectionPhase::Connected;
            state.failed = false;
            state.gate = None;

            let _ = frame_tx.send(encode::encode(&self.header_record()));
            while let Some(record) = state.backlog.pop() {
                let _ = frame_tx.send(encode::encode(&record));
            }

            state.writer = Some(WriterHandle {
                frames: frame_tx,
                done: Some(done_rx),
                cancel: cancel.clone(),
                generation,
            });
        }

        // Ack drain; the peer vanishing is detected here, not by writes.
        {
            let shared = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = reader.drain() => shared.mark_peer_closed(generation),
                }
            });
        }

        {
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                shared
                    .run_writer(generation, writer, frame_rx, cancel, done_tx)
                    .await;
            });
        }

        self.metrics.connect_ok();
        tracing::debug!(target = %self.endpoint.describe(), "connected");
        self.observer.on_connect(&banner);
    }

    fn fail_connect(self: &Arc<Self>, generation: u64, error: ClientError) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return; // superseded by a disconnect; nobody cares
            }
            state.connect_done = None;
            state.phase = ConnectionPhase::Disconnected;
            state.failed = true;
            state.gate = Some(Instant::now());

            // Records are already waiting; retry once the gate opens.
            if self.config.reconnect && self.config.keep_open() && !state.backlog.is_empty() {
                self.arm_reconnect_timer(&mut state);
            }
        }

        self.metrics.connect_failed();
        tracing::debug!(target = %self.endpoint.describe(), error = %error, "connect failed");
        self.observer.on_error(&error);
    }

    // -------------------------------------------------------------------
    // Scheduler hooks
    // -------------------------------------------------------------------

    /// Execute one scheduler command; errors are absorbed into the state
    /// machine, never raised back to the executor
    pub(crate) async fn exec_command(self: &Arc<Self>, command: Command) {
        match command {
            Command::Connect => self.exec_connect().await,
            Command::Write(record) => self.submit_record(record),
            Command::Disconnect => self.shutdown_connection().await,
            Command::Dispatch(task) => task(),
        }
    }

    /// Start (or join) the connect attempt and wait for its outcome, so
    /// commands queued behind it observe the final state
    async fn exec_connect(self: &Arc<Self>) {
        self.start_connect();

        let receiver = self.state.lock().connect_done.clone();
        if let Some(mut receiver) = receiver {
            while !*receiver.borrow() {
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Connection tasks
    // -------------------------------------------------------------------

    async fn run_writer(
        self: Arc<Self>,
        generation: u64,
        mut writer: FrameWriter,
        mut frames: mpsc::UnboundedReceiver<bytes::Bytes>,
        cancel: CancellationToken,
        done: oneshot::Sender<()>,
    ) {
        enum Exit {
            Cancelled,
            WriteError(std::io::Error),
            Drained,
        }

        let exit = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Exit::Cancelled,
                frame = frames.recv() => match frame {
                    Some(frame) => match writer.write_frame(&frame).await {
                        Ok(()) => self.metrics.record_written(frame.len() as u64),
                        Err(error) => break Exit::WriteError(error),
                    },
                    None => break Exit::Drained,
                }
            }
        };

        match exit {
            Exit::Drained => {
                // Orderly close: everything queued has been written.
                writer.finish(DISCONNECT_GRACE).await;
                self.teardown(generation, false);
            }
            Exit::WriteError(error) => {
                drop(writer);
                self.metrics.write_error();
                let error = ClientError::Write(error);
                tracing::debug!(error = %error, "write failed");
                self.teardown(generation, true);
                self.observer.on_error(&error);
            }
            Exit::Cancelled => drop(writer),
        }

        self.observer.on_disconnect();
        let _ = done.send(());
    }

    /// Reader saw end-of-stream: the viewer went away
    fn mark_peer_closed(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.writer.as_ref().map(|w| w.generation) != Some(generation) {
                return;
            }
            state.writer = None;
            state.generation += 1;
            state.phase = ConnectionPhase::Disconnected;
            state.failed = true;
            state.gate = Some(Instant::now());

            if self.config.reconnect && self.config.keep_open() && !state.backlog.is_empty() {
                self.arm_reconnect_timer(&mut state);
            }
        }

        tracing::debug!(target = %self.endpoint.describe(), "peer closed connection");
        self.observer.on_error(&ClientError::PeerClosed);
    }

    /// Connection went away underneath the writer
    fn teardown(&self, generation: u64, failed: bool) {
        let mut state = self.state.lock();
        if state.writer.as_ref().map(|w| w.generation) != Some(generation) {
            return; // someone else already cleaned up
        }
        state.writer = None;
        state.generation += 1;
        state.phase = ConnectionPhase::Disconnected;
        if failed {
            state.failed = true;
            state.gate = Some(Instant::now());
        }
    }

    // -------------------------------------------------------------------
    // Disconnect path
    // -------------------------------------------------------------------

    /// Graceful shutdown: drain pending frames, end the stream, reset state
    pub(crate) async fn shutdown_connection(&self) {
        let handle = {
            let mut state = self.state.lock();
            state.reconnect_timer_generation = None;
            state.connect_done = None;
            state.generation += 1;
            state.phase = ConnectionPhase::Disconnected;
            state.writer.take()
        };

        let Some(mut handle) = handle else {
            return; // idempotent: nothing to close
        };

        let done = handle.done.take();
        let cancel = handle.cancel.clone();
        // Dropping the handle closes the frame channel; the writer drains
        // and ends the stream.
        drop(handle);

        if let Some(done) = done {
            if tokio::time::timeout(DISCONNECT_GRACE, done).await.is_err() {
                tracing::debug!("graceful disconnect timed out, destroying socket");
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
