use super::Runtime;
use crate::error::Result;
use crate::runtime::fiber::Failure;
use crate::time::{Clock, SystemClock};

use std::fmt;
use std::sync::Arc;
use std::thread;

/// Default stack size of a fiber, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Smallest stack a fiber is given, in bytes.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Callback invoked with every fiber failure nobody observed.
pub(crate) type UnobservedHook = Arc<dyn Fn(&Failure) + Send + Sync>;

/// Resolved runtime configuration.
pub(crate) struct Config {
    pub(crate) worker_threads: usize,
    pub(crate) stack_size: usize,
    pub(crate) thread_name: String,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) reporter: Option<UnobservedHook>,
}

/// Builder for configuring and creating a runtime.
///
/// `RuntimeBuilder` allows customizing runtime parameters before
/// constructing the runtime: the number of worker threads, the default
/// fiber stack size, worker thread names, the clock timers are measured
/// against, and a hook for fiber failures nobody observed.
///
/// # Examples
///
/// ```rust
/// use filament::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(4)
///     .stack_size(128 * 1024)
///     .build();
///
/// assert_eq!(runtime.block_on(|_fiber| 1 + 1), 2);
/// ```
pub struct RuntimeBuilder {
    /// Number of worker threads in the executor.
    worker_threads: usize,

    /// Default stack size for fibers spawned without an override.
    stack_size: usize,

    /// Prefix of worker thread names.
    thread_name: String,

    clock: Arc<dyn Clock>,

    reporter: Option<UnobservedHook>,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    ///
    /// By default, the number of worker threads is set to the number
    /// of available logical CPUs, falling back to `1` if unavailable.
    /// Fibers get [`DEFAULT_STACK_SIZE`] bytes of stack and timers use the
    /// [`SystemClock`].
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: "filament-worker".to_owned(),
            clock: Arc::new(SystemClock),
            reporter: None,
        }
    }

    /// Sets the number of worker threads used by the runtime.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use filament::RuntimeBuilder;
    ///
    /// let builder = RuntimeBuilder::new()
    ///     .worker_threads(2);
    /// ```
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the default fiber stack size, in bytes.
    ///
    /// Values below [`MIN_STACK_SIZE`] are rounded up.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes.max(MIN_STACK_SIZE);
        self
    }

    /// Sets the prefix of worker thread names; workers are named
    /// `{prefix}-{index}`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Replaces the clock used for every deadline.
    ///
    /// Pass a [`ManualClock`](crate::time::ManualClock) to drive sleeps
    /// deterministically from a test.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Installs a hook called with each failure of a fiber whose handle was
    /// dropped without observing it.
    ///
    /// The hook runs on whichever thread notices the failure first.
    pub fn on_unobserved_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(hook));
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// This starts the reactor and the worker threads.
    ///
    /// # Panics
    ///
    /// Panics if a runtime thread cannot be started; see
    /// [`try_build`](Self::try_build) for the fallible variant.
    pub fn build(self) -> Runtime {
        match self.try_build() {
            Ok(runtime) => runtime,
            Err(err) => panic!("failed to build runtime: {err}"),
        }
    }

    /// Builds the runtime, reporting thread start failures as errors.
    pub fn try_build(self) -> Result<Runtime> {
        Runtime::new(Config {
            worker_threads: self.worker_threads,
            stack_size: self.stack_size,
            thread_name: self.thread_name,
            clock: self.clock,
            reporter: self.reporter,
        })
    }
}

impl Default for RuntimeBuilder {
    /// Creates a default `RuntimeBuilder`.
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("worker_threads", &self.worker_threads)
            .field("stack_size", &self.stack_size)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}
