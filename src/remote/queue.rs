use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::schema::Command;

/// A command waiting for the next host tick.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedCommand {
    /// Arrival sequence number, starting at 1.
    pub seq: u64,
    /// The validated command.
    pub command: Command,
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    pending: VecDeque<QueuedCommand>,
}

/// FIFO of commands shared between the server thread and the host tick.
///
/// This is the only state the server thread mutates. It is unbounded: when ticks are slower than
/// arrivals the queue grows, and nothing pushes back on clients.
#[derive(Clone, Debug, Default)]
pub struct PendingCommandQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl PendingCommandQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    // Queue contents stay consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command; returns its sequence number.
    pub fn push(&self, command: Command) -> u64 {
        let mut st = self.lock();
        st.next_seq += 1;
        let seq = st.next_seq;
        st.pending.push_back(QueuedCommand { seq, command });
        seq
    }

    /// Take every pending command, oldest first.
    pub fn drain(&self) -> Vec<QueuedCommand> {
        let mut st = self.lock();
        st.pending.drain(..).collect()
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/remote/queue.rs"]
mod tests;
