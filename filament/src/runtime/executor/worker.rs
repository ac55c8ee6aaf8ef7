use crate::error::Result;
use crate::runtime::context::enter_context;
use crate::runtime::executor::message::{Message, SpawnRequest};
use crate::runtime::fiber::shared::Outcome;
use crate::runtime::fiber::{Failure, FiberObject, State};
use crate::runtime::handle::Handle;
use crate::utils::{Key, Slab};

use corosensei::stack::DefaultStack;

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, Sender};

use tracing::{debug, debug_span, error, trace, warn};

/// A worker thread in the executor.
///
/// A `Worker` owns every fiber it creates and is the only thread that ever
/// resumes them. The execution order is:
/// 1. Drain the inbox (spawns and wakeups)
/// 2. Resume the next ready fiber
/// 3. Block on the inbox if nothing is ready
pub(crate) struct Worker {
    /// Unique identifier of the worker.
    id: usize,

    inbox: Receiver<Message>,

    /// The sending side of `inbox`, handed to completions created here.
    sender: Sender<Message>,

    handle: Handle,

    fibers: Slab<FiberObject>,

    /// Ready fibers in FIFO order.
    ready: VecDeque<Key>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        inbox: Receiver<Message>,
        sender: Sender<Message>,
        handle: Handle,
    ) -> Self {
        Self {
            id,
            inbox,
            sender,
            handle,
            fibers: Slab::with_capacity(64),
            ready: VecDeque::new(),
        }
    }

    /// Runs the worker loop until shutdown, then tears down every fiber
    /// still alive on this worker.
    pub(crate) fn run(mut self) {
        let span = debug_span!("worker", id = self.id);
        let _enter = span.enter();

        debug!("worker started");

        let handle = self.handle.clone();
        enter_context(handle, self.id, || {
            self.run_loop();
            self.teardown();
        });

        debug!("worker stopped");
    }

    fn run_loop(&mut self) {
        loop {
            while let Ok(message) = self.inbox.try_recv() {
                if self.dispatch(message).is_break() {
                    return;
                }
            }

            if let Some(key) = self.ready.pop_front() {
                self.advance(key);
                continue;
            }

            match self.inbox.recv() {
                Ok(message) => {
                    if self.dispatch(message).is_break() {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }

    fn dispatch(&mut self, message: Message) -> ControlFlow<()> {
        match message {
            Message::Spawn(request) => self.spawn(request),
            Message::Wake { key, token, status } => self.wake(key, token, status),
            Message::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    fn spawn(&mut self, mut request: SpawnRequest) {
        let Some(entry) = request.take_entry() else {
            return;
        };

        let shared = request.shared().clone();
        let id = shared.id();

        let stack = match DefaultStack::new(request.stack_size()) {
            Ok(stack) => stack,
            Err(err) => {
                error!(fiber = %id, %err, "failed to allocate fiber stack");

                let message = format!("failed to allocate fiber stack: {err}");
                shared.finish(Outcome::Panicked {
                    failure: Failure::new(id, shared.name(), message),
                    payload: None,
                });
                return;
            }
        };

        let handle = self.handle.clone();
        let sender = self.sender.clone();
        let key = self
            .fibers
            .insert_with(|key| FiberObject::new(key, entry, stack, shared, handle, sender));

        debug!(fiber = %id, "fiber spawned");
        self.schedule(key);
    }

    /// Gives a ready fiber its next slice, after every fiber already queued.
    fn schedule(&mut self, key: Key) {
        self.ready.push_back(key);
    }

    fn wake(&mut self, key: Key, token: u64, status: Result<()>) {
        let Some(fiber) = self.fibers.get_mut(key) else {
            trace!(token, "wakeup for a fiber that no longer exists");
            return;
        };

        match fiber.wake(token, status) {
            Ok(()) => self.schedule(key),
            Err(err) => warn!(
                fiber = %fiber.id(),
                state = ?fiber.state(),
                token,
                %err,
                "protocol violation: unexpected wakeup"
            ),
        }
    }

    fn advance(&mut self, key: Key) {
        let Some(fiber) = self.fibers.get_mut(key) else {
            return;
        };

        let id = fiber.id();

        match fiber.advance_one_step() {
            Ok(State::Ready) => {
                trace!(fiber = %id, "fiber yielded");
                self.schedule(key);
            }
            Ok(State::Blocked | State::Running) => trace!(fiber = %id, "fiber blocked"),
            Ok(State::Stopped) => {
                if let Some(fiber) = self.fibers.remove(key) {
                    fiber.finalize();
                }
                debug!(fiber = %id, "fiber stopped");
            }
            Err(err) => warn!(fiber = %id, %err, "fiber could not be resumed"),
        }
    }

    fn teardown(&mut self) {
        self.ready.clear();

        let live = self.fibers.len();
        if live > 0 {
            debug!(count = live, "aborting live fibers");
        }

        drop(self.fibers.drain());

        while let Ok(message) = self.inbox.try_recv() {
            drop(message);
        }
    }
}
