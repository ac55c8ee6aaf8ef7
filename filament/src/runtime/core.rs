use super::builder::Config;
use super::executor::core::Executor;
use super::handle::Handle;
use crate::error::Result;
use crate::reactor::{Reactor, ReactorHandle};
use crate::runtime::fiber::{Fiber, JoinHandle};

use std::panic;
use std::thread;

use tracing::debug;

/// The main runtime handle.
///
/// `Runtime` is responsible for:
/// - spawning fibers onto its worker threads,
/// - integrating with the reactor for timers,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// Dropping the runtime shuts down all internal components in an orderly
/// fashion. Fibers still alive at that point are unwound and their handles
/// report [`Error::Shutdown`](crate::Error::Shutdown).
pub struct Runtime {
    /// Fiber executor owning the worker threads.
    executor: Executor,

    /// Handle to the reactor thread.
    reactor: ReactorHandle,

    reactor_thread: Option<thread::JoinHandle<()>>,
}

impl Runtime {
    /// Starts the reactor, then the executor.
    pub(crate) fn new(config: Config) -> Result<Self> {
        let (reactor, reactor_thread) = Reactor::start(config.clock.clone())?;

        let executor = match Executor::start(&config, reactor.clone()) {
            Ok(executor) => executor,
            Err(err) => {
                reactor.shutdown();
                let _ = reactor_thread.join();
                return Err(err);
            }
        };

        debug!(workers = config.worker_threads, "runtime started");

        Ok(Self {
            executor,
            reactor,
            reactor_thread: Some(reactor_thread),
        })
    }

    /// A handle that can spawn onto this runtime from any thread.
    pub fn handle(&self) -> &Handle {
        self.executor.handle()
    }

    /// Spawns a fiber onto the runtime.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use filament::RuntimeBuilder;
    ///
    /// let runtime = RuntimeBuilder::new().worker_threads(1).build();
    /// let handle = runtime.spawn(|fiber| {
    ///     fiber.yield_now().unwrap();
    ///     7
    /// });
    /// assert_eq!(handle.join_blocking(), Ok(7));
    /// ```
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle().spawn(f)
    }

    /// Runs `f` in a fiber, blocking the current thread until it returns.
    ///
    /// This method is typically used as the synchronous entry point
    /// of the runtime (e.g. in `main` or tests).
    ///
    /// # Panics
    ///
    /// - Resumes the fiber's panic on the calling thread if `f` panics.
    /// - Panics if called from a worker thread, or if the runtime shuts
    ///   down before `f` returns.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use filament::RuntimeBuilder;
    ///
    /// let runtime = RuntimeBuilder::new().build();
    /// let result = runtime.block_on(|_fiber| 42);
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.spawn(f).settle_blocking() {
            Ok(value) => value,
            Err((_, Some(payload))) => panic::resume_unwind(payload),
            Err((err, None)) => panic!("block_on failed: {err}"),
        }
    }
}

impl Drop for Runtime {
    /// Shuts down the runtime.
    ///
    /// This performs the following steps:
    /// 1. Closes submission and signals every worker to stop
    /// 2. Joins all worker threads, which unwinds their remaining fibers
    /// 3. Stops the reactor, failing timers still pending
    fn drop(&mut self) {
        self.executor.shutdown();
        self.executor.join();

        self.reactor.shutdown();
        if let Some(thread) = self.reactor_thread.take() {
            let _ = thread.join();
        }

        debug!("runtime stopped");
    }
}
