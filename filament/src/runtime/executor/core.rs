use crate::error::{Error, Result};
use crate::reactor::ReactorHandle;
use crate::runtime::builder::Config;
use crate::runtime::executor::worker::Worker;
use crate::runtime::handle::Handle;

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Multi-threaded fiber executor.
///
/// The `Executor` is responsible for:
/// - spawning worker threads, each with its own inbox,
/// - handing out the [`Handle`] fibers are submitted through,
/// - managing orderly shutdown and thread joining.
pub(crate) struct Executor {
    /// Submission handle shared with every worker.
    handle: Handle,

    /// Join handles for worker threads.
    threads: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Starts `config.worker_threads` workers.
    ///
    /// If a thread fails to start, the workers started so far are shut
    /// down and joined before the error is returned.
    pub(crate) fn start(config: &Config, reactor: ReactorHandle) -> Result<Self> {
        let count = config.worker_threads;

        let mut senders = Vec::with_capacity(count);
        let mut inboxes = Vec::with_capacity(count);
        for _ in 0..count {
            let (sender, inbox) = mpsc::channel();
            senders.push(sender);
            inboxes.push(inbox);
        }

        let handle = Handle::new(
            senders.clone(),
            reactor,
            config.stack_size,
            config.reporter.clone(),
        );

        let mut executor = Self {
            handle: handle.clone(),
            threads: Vec::with_capacity(count),
        };

        for (id, (inbox, sender)) in inboxes.into_iter().zip(senders).enumerate() {
            // Fibers are not `Send`; the worker is built on its own thread.
            let worker_handle = handle.clone();

            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, id))
                .spawn(move || Worker::new(id, inbox, sender, worker_handle).run());

            match spawned {
                Ok(thread) => executor.threads.push(thread),
                Err(err) => {
                    executor.shutdown();
                    executor.join();
                    return Err(Error::Spawn(err.kind()));
                }
            }
        }

        debug!(workers = count, "executor started");
        Ok(executor)
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Signals all workers to shut down.
    ///
    /// Submission is closed first, so fibers spawned from now on are
    /// aborted instead of queued.
    pub(crate) fn shutdown(&self) {
        self.handle.shutdown_workers();
    }

    /// Waits for all worker threads to terminate.
    ///
    /// This should be called after initiating shutdown.
    pub(crate) fn join(&mut self) {
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}
