//! Background scheduler
//!
//! Owns the command queue and exactly one executor task that drains it in
//! FIFO order, handing each command back to the connection core. Producers
//! enqueue without blocking; with `throttle` enabled they may instead wait
//! for queue space, providing back-pressure.
//!
//! The executor processes up to [`MAX_BATCH`] commands per slice before
//! yielding. Once `stop` is observed, only pending disconnect commands are
//! still serviced, so a shutdown-triggered disconnect reaches the viewer
//! while draining stays bounded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::client::Shared;
use crate::command::{Command, CommandQueue};

/// Commands processed per executor slice before yielding
const MAX_BATCH: usize = 16;

/// Background drainer of the command queue
pub(crate) struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    capacity: usize,
    throttle: bool,
    queue: Mutex<CommandQueue>,
    /// Throttled producers waiting for space, in arrival order
    waiters: Mutex<VecDeque<oneshot::Sender<bool>>>,
    /// Wakes the executor when work arrives
    work: Notify,
    /// Signalled whenever the scheduler goes idle (empty queue, nothing
    /// executing)
    drained: Notify,
    /// A popped command whose execution has not finished yet
    ///
    /// Set under the queue lock at pop time so drain-waiters never observe
    /// "queue empty" while the command the pop removed is still running.
    executing: AtomicBool,
    stopped: AtomicBool,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub(crate) fn new(capacity: usize, throttle: bool) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                capacity,
                throttle,
                queue: Mutex::new(CommandQueue::new()),
                waiters: Mutex::new(VecDeque::new()),
                work: Notify::new(),
                drained: Notify::new(),
                executing: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                executor: Mutex::new(None),
            }),
        }
    }

    /// Spawn the executor; idempotent
    pub(crate) fn start(&self, shared: Arc<Shared>) {
        let mut slot = self.inner.executor.lock();
        if slot.is_some() || self.inner.stopped.load(Ordering::Acquire) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(run_executor(shared, inner)));
    }

    /// Non-blocking enqueue
    ///
    /// `Some(trimmed)` if accepted, where `trimmed` is the number of queued
    /// writes removed to make room. `None` if the scheduler is stopped or
    /// the command alone exceeds the queue capacity.
    pub(crate) fn schedule(&self, command: Command) -> Option<usize> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return None;
        }
        let cost = command.cost();
        if cost > self.inner.capacity {
            return None;
        }

        let trimmed = {
            let mut queue = self.inner.queue.lock();
            let overflow = (queue.size_bytes() + cost).saturating_sub(self.inner.capacity);
            let mut trimmed = 0;
            if overflow > 0 {
                let outcome = queue.trim(overflow);
                debug_assert!(outcome.freed_bytes >= overflow);
                trimmed = outcome.removed;
            }
            queue.push(command);
            trimmed
        };

        self.inner.work.notify_one();
        Some(trimmed)
    }

    /// Enqueue, waiting for queue space when throttled
    ///
    /// With `throttle` disabled, or while the core is failed and waiting
    /// would be pointless, this degrades to [`schedule`]. Waiters
    /// resume in FIFO order as commands dequeue and are rejected with
    /// `None` when the scheduler stops.
    ///
    /// [`schedule`]: Self::schedule
    pub(crate) async fn schedule_with_backpressure(
        &self,
        command: Command,
        core_failed: bool,
    ) -> Option<usize> {
        if !self.inner.throttle || core_failed {
            return self.schedule(command);
        }

        let cost = command.cost();
        if cost > self.inner.capacity {
            return None;
        }

        // Woken waiters re-queue at the front so arrival order survives a
        // re-check that still finds the queue full.
        let mut at_front = false;
        loop {
            if self.inner.stopped.load(Ordering::Acquire) {
                return None;
            }

            let waiter = {
                let mut queue = self.inner.queue.lock();
                if queue.size_bytes() + cost <= self.inner.capacity {
                    queue.push(command);
                    drop(queue);
                    self.inner.work.notify_one();
                    return Some(0);
                }
                let (tx, rx) = oneshot::channel();
                let mut waiters = self.inner.waiters.lock();
                if at_front {
                    waiters.push_front(tx);
                } else {
                    waiters.push_back(tx);
                }
                rx
            };

            match waiter.await {
                Ok(true) => at_front = true,
                _ => return None,
            }
        }
    }

    /// Empty the queue and release every waiter
    ///
    /// Returns the number of write commands discarded.
    pub(crate) fn clear(&self) -> usize {
        let discarded = self.inner.queue.lock().clear();
        self.inner.release_all_waiters(true);
        self.inner.drained.notify_waiters();
        discarded
    }

    /// Stop the scheduler; idempotent
    ///
    /// Rejects throttled waiters, then waits for the bounded drain: pending
    /// disconnects still go out, everything else is discarded. If the
    /// executor never started, the drain runs here instead.
    pub(crate) async fn stop(&self, shared: &Arc<Shared>) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.release_all_waiters(false);
        self.inner.work.notify_one();

        let handle = self.inner.executor.lock().take();
        match handle {
            Some(handle) => {
                let _ = handle.await;
            }
            None => drain_disconnects(shared, &self.inner).await,
        }
    }

    /// Wait until the queue is empty and the last popped command has
    /// finished executing
    pub(crate) async fn wait_drained(&self) {
        loop {
            // Register before checking; `notify_waiters` only reaches
            // already-registered waiters.
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.inner.queue.lock().count()
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.inner.queue.lock().size_bytes()
    }
}

impl SchedulerInner {
    /// Release the longest-waiting producer to re-check for space
    fn release_front_waiter(&self) {
        if let Some(waiter) = self.waiters.lock().pop_front() {
            let _ = waiter.send(true);
        }
    }

    fn release_all_waiters(&self, accept: bool) {
        let mut waiters = self.waiters.lock();
        while let Some(waiter) = waiters.pop_front() {
            let _ = waiter.send(accept);
        }
    }

    /// Pop the next command, marked as executing until
    /// [`finish_command`](Self::finish_command) runs
    fn begin_command(&self) -> Option<Command> {
        let mut queue = self.queue.lock();
        let command = queue.pop();
        if command.is_some() {
            self.executing.store(true, Ordering::Release);
        }
        command
    }

    /// Clear the executing mark and wake drain-waiters once idle
    fn finish_command(&self) {
        self.executing.store(false, Ordering::Release);
        if self.queue.lock().is_empty() {
            self.drained.notify_waiters();
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.lock().is_empty() && !self.executing.load(Ordering::Acquire)
    }
}

async fn run_executor(shared: Arc<Shared>, inner: Arc<SchedulerInner>) {
    'running: while !inner.stopped.load(Ordering::Acquire) {
        let mut slice = 0;
        while let Some(command) = inner.begin_command() {
            inner.release_front_waiter();
            shared.exec_command(command).await;
            inner.finish_command();

            if inner.stopped.load(Ordering::Acquire) {
                // Stop plus a failed core means nothing left is
                // deliverable; otherwise the remaining queue falls through
                // to the disconnect-only drain below.
                if shared.is_failed() {
                    let discarded = inner.queue.lock().clear();
                    if discarded > 0 {
                        shared.metrics.records_dropped(discarded as u64);
                    }
                    inner.drained.notify_waiters();
                }
                break 'running;
            }

            slice += 1;
            if slice >= MAX_BATCH {
                tokio::task::yield_now().await;
                slice = 0;
            }
        }

        if inner.stopped.load(Ordering::Acquire) {
            break;
        }

        let work = inner.work.notified();
        if inner.queue.lock().is_empty() {
            work.await;
        }
    }

    drain_disconnects(&shared, &inner).await;
}

/// Bounded stop drain: disconnects still go out, everything else is
/// discarded
async fn drain_disconnects(shared: &Arc<Shared>, inner: &Arc<SchedulerInner>) {
    let mut discarded_writes = 0u64;
    while let Some(command) = inner.begin_command() {
        if command.is_disconnect() {
            shared.exec_command(command).await;
        } else if command.is_write() {
            discarded_writes += 1;
        }
        inner.finish_command();
    }
    if discarded_writes > 0 {
        shared.metrics.records_dropped(discarded_writes);
        tracing::debug!(discarded = discarded_writes, "writes discarded at stop");
    }
    inner.drained.notify_waiters();
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
