use crate::error::{Error, Result};
use crate::reactor::ReactorHandle;
use crate::runtime::builder::UnobservedHook;
use crate::runtime::context;
use crate::runtime::executor::message::{Message, SpawnRequest};
use crate::runtime::fiber::{Builder, Fiber, JoinHandle};
use crate::time::Clock;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::Instant;

use tracing::trace;

/// A cloneable, thread-safe reference to a running runtime.
///
/// A `Handle` spawns fibers from any thread, including threads that are
/// not part of the runtime. Fibers are placed on workers round-robin.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<Inner>,
}

struct Inner {
    workers: Vec<Sender<Message>>,
    next: AtomicUsize,
    reactor: ReactorHandle,
    stack_size: usize,
    reporter: Option<UnobservedHook>,
    closed: AtomicBool,
}

impl Handle {
    pub(crate) fn new(
        workers: Vec<Sender<Message>>,
        reactor: ReactorHandle,
        stack_size: usize,
        reporter: Option<UnobservedHook>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                workers,
                next: AtomicUsize::new(0),
                reactor,
                stack_size,
                reporter,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The handle of the runtime owning the current worker thread.
    ///
    /// # Errors
    ///
    /// [`Error::NoRuntime`] outside a worker thread.
    pub fn current() -> Result<Handle> {
        context::current_handle().ok_or(Error::NoRuntime)
    }

    /// Spawns a fiber running `f`.
    ///
    /// If the runtime is shutting down the fiber never runs and its handle
    /// reports [`Error::Shutdown`].
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        Builder::new().spawn_on(self, f)
    }

    /// The current time according to the runtime's clock.
    pub fn now(&self) -> Instant {
        self.inner.reactor.clock().now()
    }

    /// The runtime's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.inner.reactor.clock()
    }

    pub(crate) fn reactor(&self) -> &ReactorHandle {
        &self.inner.reactor
    }

    pub(crate) fn default_stack_size(&self) -> usize {
        self.inner.stack_size
    }

    pub(crate) fn reporter(&self) -> Option<UnobservedHook> {
        self.inner.reporter.clone()
    }

    /// Queues `request` on the next worker.
    ///
    /// A request that cannot be delivered is dropped, which aborts its
    /// fiber.
    pub(crate) fn submit(&self, request: SpawnRequest) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }

        let index = self.inner.next.fetch_add(1, Ordering::Relaxed) % self.inner.workers.len();
        trace!(fiber = %request.shared().id(), worker = index, "fiber submitted");

        let _ = self.inner.workers[index].send(Message::Spawn(request));
    }

    /// Closes submission and tells every worker to stop.
    pub(crate) fn shutdown_workers(&self) {
        self.inner.closed.store(true, Ordering::Release);

        for worker in &self.inner.workers {
            let _ = worker.send(Message::Shutdown);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("workers", &self.inner.workers.len())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}
