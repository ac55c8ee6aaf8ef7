use crate::error::Result;
use crate::runtime::fiber::shared::{Outcome, Shared};
use crate::runtime::fiber::Fiber;
use crate::utils::Key;

use std::sync::Arc;

/// A fiber entry closure with its output already routed to the join handle.
pub(crate) type Entry = Box<dyn FnOnce(&Fiber<'_>) + Send>;

/// Messages delivered to a worker's inbox.
///
/// The inbox is the only way other threads affect a worker's fibers, which
/// makes the worker the serialization domain for all of them.
pub(crate) enum Message {
    /// Create a fiber on this worker and schedule it.
    Spawn(SpawnRequest),

    /// Deliver the status of a completion to a blocked fiber.
    Wake {
        key: Key,
        token: u64,
        status: Result<()>,
    },

    /// Stop the worker loop.
    Shutdown,
}

/// Everything a worker needs to create a fiber.
///
/// A request dropped before a worker takes its entry (for example because
/// the runtime shut down with the request still queued) marks the fiber as
/// aborted so its joiners are released.
pub(crate) struct SpawnRequest {
    entry: Option<Entry>,
    shared: Arc<Shared>,
    stack_size: usize,
}

impl SpawnRequest {
    pub(crate) fn new(entry: Entry, shared: Arc<Shared>, stack_size: usize) -> Self {
        Self {
            entry: Some(entry),
            shared,
            stack_size,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub(crate) fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }
}

impl Drop for SpawnRequest {
    fn drop(&mut self) {
        if self.entry.is_some() {
            self.shared.finish(Outcome::Aborted);
        }
    }
}
