use super::shared::{Outcome, Shared, StopHook};
use super::{FiberId, State};
use crate::error::{Error, Result};
use crate::runtime::context;

use parking_lot::Mutex;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;

/// A handle to a spawned fiber.
///
/// A `JoinHandle` observes the fiber from anywhere: from another fiber via
/// [`Fiber::join`](super::Fiber::join), or from a plain thread via
/// [`join_blocking`](Self::join_blocking).
///
/// Dropping the handle does **not** cancel the fiber; it only discards the
/// ability to observe its result. A detached fiber that panics is reported
/// as an unobserved failure.
pub struct JoinHandle<T> {
    shared: Arc<Shared>,
    output: Arc<Mutex<Option<T>>>,
}

/// The error side of settling a handle; the payload is kept when the fiber
/// panicked so the panic can be resumed elsewhere.
pub(crate) type Settled = (Error, Option<Box<dyn Any + Send>>);

impl<T> JoinHandle<T> {
    pub(crate) fn new(shared: Arc<Shared>, output: Arc<Mutex<Option<T>>>) -> Self {
        Self { shared, output }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// The fiber's identifier.
    pub fn id(&self) -> FiberId {
        self.shared.id()
    }

    /// The fiber's current name.
    pub fn name(&self) -> Option<String> {
        self.shared.name()
    }

    /// The fiber's last published state.
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Returns `true` once the fiber has stopped.
    pub fn is_finished(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Blocks the calling thread until the fiber stops and returns its output.
    ///
    /// # Errors
    ///
    /// - [`Error::BlockingOnWorker`] when called from a worker thread;
    ///   use [`Fiber::join_and_rethrow`](super::Fiber::join_and_rethrow)
    ///   there instead.
    /// - [`Error::Panicked`] if the fiber panicked.
    /// - [`Error::Shutdown`] if the runtime stopped first.
    pub fn join_blocking(self) -> Result<T> {
        self.settle_blocking().map_err(|(err, _)| err)
    }

    /// Lets the fiber run on unobserved.
    pub fn detach(self) {}

    pub(crate) fn settle_blocking(self) -> std::result::Result<T, Settled> {
        if context::is_worker_thread() {
            return Err((Error::BlockingOnWorker, None));
        }

        let (transmitter, receiver) = mpsc::channel();
        let hook: StopHook = Box::new(move || {
            let _ = transmitter.send(());
        });

        if let Err(hook) = self.shared.on_stop(hook) {
            hook();
        }

        // A dropped hook means the runtime discarded the fiber; settle()
        // reports that as a shutdown.
        let _ = receiver.recv();

        self.settle()
    }

    pub(crate) fn into_result(self) -> Result<T> {
        self.settle().map_err(|(err, _)| err)
    }

    fn settle(&self) -> std::result::Result<T, Settled> {
        match self.shared.take_outcome() {
            Some(Outcome::Completed) => self
                .output
                .lock()
                .take()
                .ok_or_else(|| (Error::Other("fiber output missing".into()), None)),
            Some(Outcome::Panicked { failure, payload }) => Err((Error::Panicked(failure), payload)),
            Some(Outcome::Aborted) | None => Err((Error::Shutdown, None)),
        }
    }
}

impl<T> Drop for JoinHandle<T> {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
