//! Scheduler commands and their queue
//!
//! The scheduler drains a FIFO of commands. Only `Write` commands carry a
//! byte cost; connection-lifecycle commands are free, and `trim` never
//! removes them. Back-pressure may shed records, never a pending connect
//! or disconnect.

use std::collections::VecDeque;
use std::fmt;

use spyglass_protocol::{estimate_size, Record};

use crate::backlog::ITEM_OVERHEAD;

/// Caller-supplied task executed on the scheduler context
pub type DispatchTask = Box<dyn FnOnce() + Send + 'static>;

/// One unit of scheduler work
pub enum Command {
    /// Establish the connection
    Connect,
    /// Deliver a record
    Write(Record),
    /// Tear the connection down
    Disconnect,
    /// Run an opaque task on the scheduler context
    Dispatch(DispatchTask),
}

impl Command {
    /// Accounted cost in bytes; zero for everything but `Write`
    pub fn cost(&self) -> usize {
        match self {
            Command::Write(record) => estimate_size(record) + ITEM_OVERHEAD,
            _ => 0,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Command::Write(_))
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Command::Disconnect)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => f.write_str("Connect"),
            Command::Write(record) => f.debug_tuple("Write").field(&record.kind()).finish(),
            Command::Disconnect => f.write_str("Disconnect"),
            Command::Dispatch(_) => f.write_str("Dispatch"),
        }
    }
}

/// Result of a [`CommandQueue::trim`] pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Bytes freed by removing `Write` commands
    pub freed_bytes: usize,
    /// Number of `Write` commands removed
    pub removed: usize,
}

/// FIFO of scheduler commands with selective trimming
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: VecDeque<Command>,
    size_bytes: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&mut self, command: Command) {
        self.size_bytes += command.cost();
        self.items.push_back(command);
    }

    /// Remove and return the oldest command
    pub fn pop(&mut self) -> Option<Command> {
        let command = self.items.pop_front()?;
        self.size_bytes -= command.cost();
        Some(command)
    }

    /// Remove oldest `Write` commands until at least `min_bytes` are freed
    /// or none remain
    ///
    /// Other command kinds are skipped in place, keeping their position.
    pub fn trim(&mut self, min_bytes: usize) -> TrimOutcome {
        let mut outcome = TrimOutcome {
            freed_bytes: 0,
            removed: 0,
        };
        let mut index = 0;
        while index < self.items.len() && outcome.freed_bytes < min_bytes {
            if self.items[index].is_write() {
                let cost = self.items[index].cost();
                self.items.remove(index);
                self.size_bytes -= cost;
                outcome.freed_bytes += cost;
                outcome.removed += 1;
            } else {
                index += 1;
            }
        }
        outcome
    }

    /// Remove every command
    ///
    /// Returns the number of `Write` commands that were discarded.
    pub fn clear(&mut self) -> usize {
        let writes = self.items.iter().filter(|c| c.is_write()).count();
        self.items.clear();
        self.size_bytes = 0;
        writes
    }

    /// Number of queued commands
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Accounted size of all queued commands
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;
