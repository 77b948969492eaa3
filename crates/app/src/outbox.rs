//! Bounded, key-coalescing queue of commands waiting for the gateway.
//!
//! The gateway processes one command at a time, slowly. Rapid callers (a
//! slider being dragged) would otherwise queue dozens of intermediate targets,
//! so a newer command for the same [`CommandKey`] replaces the queued one at
//! enqueue time. The replacement goes to the back of the queue.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use cubelink_domain::command::{CommandKey, SendCommand};
use cubelink_domain::error::QueueFullError;

/// Default number of commands the outbox holds.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Default)]
struct Queue {
    next_seq: u64,
    /// Enqueue order; the smallest sequence is the oldest command.
    pending: BTreeMap<u64, SendCommand>,
    /// Position of the queued command for each key.
    by_key: HashMap<CommandKey, u64>,
}

/// FIFO of pending [`SendCommand`]s holding at most one command per key.
///
/// Internally synchronised; submitting never waits on network IO.
#[derive(Debug)]
pub struct CommandOutbox {
    capacity: usize,
    queue: Mutex<Queue>,
}

impl Default for CommandOutbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CommandOutbox {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(Queue::default()),
        }
    }

    /// Enqueue `cmd`, returning the queued command it superseded, if any.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFullError`] when the outbox is already at capacity. The
    /// check happens before supersession, so a full outbox rejects even a
    /// command whose key is already queued.
    pub fn try_submit(&self, cmd: SendCommand) -> Result<Option<SendCommand>, QueueFullError> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.pending.len() >= self.capacity {
            return Err(QueueFullError {
                capacity: self.capacity,
            });
        }

        let seq = queue.next_seq;
        queue.next_seq += 1;

        let superseded = queue
            .by_key
            .insert(cmd.key.clone(), seq)
            .and_then(|old_seq| queue.pending.remove(&old_seq));
        queue.pending.insert(seq, cmd);
        Ok(superseded)
    }

    /// Enqueue `cmd`; `false` means it was dropped because the outbox is full.
    pub fn submit(&self, cmd: SendCommand) -> bool {
        let id = cmd.id;
        let key = cmd.key.clone();
        match self.try_submit(cmd) {
            Ok(Some(stale)) => {
                tracing::debug!(%key, superseded = %stale.id, by = %id, "queued command superseded");
                true
            }
            Ok(None) => {
                tracing::trace!(%key, %id, "command queued");
                true
            }
            Err(err) => {
                tracing::warn!(%err, %key, %id, "command dropped");
                false
            }
        }
    }

    /// Pop the oldest queued command.
    pub fn drain(&self) -> Option<SendCommand> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, cmd) = queue.pending.pop_first()?;
        queue.by_key.remove(&cmd.key);
        Some(cmd)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
