use super::completion::Completion;
use super::local::LocalStorage;
use super::shared::{Failure, Outcome, Shared};
use super::{Fiber, FiberId, State};
use crate::error::{Error, Result};
use crate::runtime::Handle;
use crate::runtime::executor::message::{Entry, Message};
use crate::utils::Key;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::warn;

/// The stackful body of a fiber.
///
/// The coroutine is resumed with the status of the wait that blocked it,
/// yields the state it suspends into, and returns the captured panic, if
/// any.
type Body = Coroutine<Result<()>, State, Option<Panic>, DefaultStack>;

/// A panic caught at the execution-wrapper boundary.
pub(crate) struct Panic {
    failure: Failure,
    payload: Box<dyn Any + Send>,
}

/// Per-fiber data reachable from both the worker and the fiber body.
///
/// `Record` is shared through an `Rc` and never leaves the worker thread;
/// the worker and the body never hold a borrow across a suspension point.
pub(crate) struct Record {
    key: Key,
    shared: Arc<Shared>,
    handle: Handle,
    sender: Sender<Message>,

    /// `true` iff control is logically inside the fiber's body.
    inside: Cell<bool>,

    /// `true` while a completion is being armed.
    arming: Cell<bool>,

    /// Set when a suspended body is unwound during runtime teardown.
    tearing_down: Cell<bool>,

    next_token: Cell<u64>,
    awaiting: Cell<Option<u64>>,

    last_result: RefCell<Result<()>>,
    cleanup: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    pub(crate) storage: RefCell<LocalStorage>,
}

impl Record {
    fn new(key: Key, shared: Arc<Shared>, handle: Handle, sender: Sender<Message>) -> Self {
        Self {
            key,
            shared,
            handle,
            sender,
            inside: Cell::new(false),
            arming: Cell::new(false),
            tearing_down: Cell::new(false),
            next_token: Cell::new(0),
            awaiting: Cell::new(None),
            last_result: RefCell::new(Ok(())),
            cleanup: RefCell::new(VecDeque::new()),
            storage: RefCell::new(LocalStorage::default()),
        }
    }

    pub(crate) fn id(&self) -> FiberId {
        self.shared.id()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn is_inside(&self) -> bool {
        self.inside.get()
    }

    pub(crate) fn is_arming(&self) -> bool {
        self.arming.get()
    }

    pub(crate) fn set_inside(&self, inside: bool) {
        self.inside.set(inside);
    }

    /// Creates the completion for the next wait.
    ///
    /// From here on the fiber is committed to blocking: the only wake the
    /// worker accepts is the one carrying this completion's token.
    pub(crate) fn arm_completion(&self) -> Completion {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        self.awaiting.set(Some(token));

        Completion::new(self.id(), self.key, token, self.sender.clone())
    }

    /// Runs `arm` with the arming flag raised.
    ///
    /// The previous value is restored even if `arm` unwinds.
    pub(crate) fn arming<R>(&self, arm: impl FnOnce() -> R) -> R {
        struct Restore<'a> {
            flag: &'a Cell<bool>,
            previous: bool,
        }

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.flag.set(self.previous);
            }
        }

        let _restore = Restore {
            flag: &self.arming,
            previous: self.arming.replace(true),
        };

        arm()
    }

    fn accept_wake(&self, token: u64) -> bool {
        if self.awaiting.get() == Some(token) {
            self.awaiting.set(None);
            true
        } else {
            false
        }
    }

    pub(crate) fn last_result(&self) -> Result<()> {
        self.last_result.borrow().clone()
    }

    pub(crate) fn set_last_result(&self, status: Result<()>) {
        *self.last_result.borrow_mut() = status;
    }

    pub(crate) fn push_cleanup(&self, f: Box<dyn FnOnce()>) {
        self.cleanup.borrow_mut().push_back(f);
    }

    /// Runs the cleanup queue in registration order.
    fn run_cleanup(&self) {
        loop {
            let next = self.cleanup.borrow_mut().pop_front();
            let Some(f) = next else {
                break;
            };

            if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
                warn!(fiber = %self.id(), "cleanup function panicked");
            }
        }
    }

    /// Runs the destructor of every remaining fiber-local value.
    fn destroy_storage(&self) {
        let slots = self.storage.borrow_mut().take_all();

        for slot in slots {
            slot.destroy();
        }
    }
}

/// The execution wrapper run as the coroutine body.
///
/// A panic escaping the entry closure is captured here and never crosses
/// the suspend boundary. Cleanup functions and fiber-local destructors run
/// before the worker observes the fiber as stopped.
fn execute(yielder: &Yielder<Result<()>, State>, record: Rc<Record>, entry: Entry) -> Option<Panic> {
    record.set_inside(true);

    let fiber = Fiber::new(yielder, record.clone());
    let result = panic::catch_unwind(AssertUnwindSafe(|| entry(&fiber)));
    drop(fiber);

    let panic = match result {
        Ok(()) => None,
        Err(payload) => {
            // Teardown unwinds suspended stacks; let that unwind finish.
            if record.tearing_down.get() {
                panic::resume_unwind(payload);
            }

            let failure = Failure::from_panic(record.id(), record.shared.name(), &*payload);
            Some(Panic { failure, payload })
        }
    };

    record.run_cleanup();
    record.destroy_storage();
    record.set_inside(false);

    panic
}

/// A fiber as owned by its worker.
pub(crate) struct FiberObject {
    state: State,
    body: Option<Body>,
    record: Rc<Record>,

    /// Status to resume the body with on the next advance.
    pending: Option<Result<()>>,

    outcome: Option<Outcome>,
}

impl FiberObject {
    pub(crate) fn new(
        key: Key,
        entry: Entry,
        stack: DefaultStack,
        shared: Arc<Shared>,
        handle: Handle,
        sender: Sender<Message>,
    ) -> Self {
        let record = Rc::new(Record::new(key, shared, handle, sender));
        let body_record = record.clone();

        let body = Coroutine::with_stack(
            stack,
            move |yielder: &Yielder<Result<()>, State>, _start: Result<()>| {
                execute(yielder, body_record, entry)
            },
        );

        record.shared.publish_state(State::Ready);

        Self {
            state: State::Ready,
            body: Some(body),
            record,
            pending: None,
            outcome: None,
        }
    }

    pub(crate) fn id(&self) -> FiberId {
        self.record.id()
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Unchecked state write for the worker's own resume path.
    fn raw_set_state(&mut self, state: State) {
        self.state = state;

        // `Stopped` is published by `Shared::finish`, with the outcome.
        if state != State::Stopped {
            self.record.shared.publish_state(state);
        }
    }

    /// Changes state from the scheduler side.
    ///
    /// The fiber is not executing, so this is a direct write, validated
    /// against the state machine.
    pub(crate) fn set_state(&mut self, next: State) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        self.raw_set_state(next);
        Ok(())
    }

    /// Resumes the body until it suspends or finishes.
    ///
    /// Returns the state the fiber ended the step in: `Ready` (it yielded),
    /// `Blocked` (it waits for a completion) or `Stopped`.
    pub(crate) fn advance_one_step(&mut self) -> Result<State> {
        if self.body.is_none() {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: State::Running,
            });
        }

        self.set_state(State::Running)?;

        let status = self.pending.take().unwrap_or(Ok(()));
        let result = match self.body.as_mut() {
            Some(body) => body.resume(status),
            None => unreachable!("body checked above"),
        };

        match result {
            CoroutineResult::Yield(next) => {
                self.raw_set_state(next);
                Ok(next)
            }
            CoroutineResult::Return(panic) => {
                self.body = None;
                self.outcome = Some(match panic {
                    None => Outcome::Completed,
                    Some(Panic { failure, payload }) => Outcome::Panicked {
                        failure,
                        payload: Some(payload),
                    },
                });

                self.raw_set_state(State::Stopped);
                Ok(State::Stopped)
            }
        }
    }

    /// Applies a completion delivered for `token`.
    ///
    /// Only a blocked fiber waiting on exactly that token can be woken.
    pub(crate) fn wake(&mut self, token: u64, status: Result<()>) -> Result<()> {
        if self.state != State::Blocked || !self.record.accept_wake(token) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: State::Ready,
            });
        }

        self.pending = Some(status);
        self.set_state(State::Ready)
    }

    /// Publishes the outcome of a stopped fiber, releasing its joiners.
    pub(crate) fn finalize(mut self) {
        let outcome = self.outcome.take().unwrap_or(Outcome::Completed);
        self.record.shared.finish(outcome);
    }
}

impl Drop for FiberObject {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            self.record.tearing_down.set(true);
            drop(body);

            // The forced unwind skipped the tail of `execute`.
            self.record.run_cleanup();
            self.record.destroy_storage();
        }

        if let Some(outcome) = self.outcome.take() {
            self.record.shared.finish(outcome);
        } else {
            self.record.shared.finish(Outcome::Aborted);
        }
    }
}
