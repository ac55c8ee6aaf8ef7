use super::{FiberId, State};
use crate::runtime::builder::UnobservedHook;

use parking_lot::Mutex;

use std::any::Any;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::warn;

/// Callback run once when a fiber stops.
pub(crate) type StopHook = Box<dyn FnOnce() + Send>;

/// A panic captured from a fiber's entry closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    fiber: FiberId,
    name: Option<String>,
    message: String,
}

impl Failure {
    pub(crate) fn new(fiber: FiberId, name: Option<String>, message: String) -> Self {
        Self {
            fiber,
            name,
            message,
        }
    }

    pub(crate) fn from_panic(
        fiber: FiberId,
        name: Option<String>,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };

        Self::new(fiber, name, message)
    }

    /// Identifier of the fiber that failed.
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    /// Name of the fiber at the time it failed, if it had one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "fiber {} '{}' panicked: {}", self.fiber, name, self.message),
            None => write!(f, "fiber {} panicked: {}", self.fiber, self.message),
        }
    }
}

/// How a fiber ended.
pub(crate) enum Outcome {
    /// The entry closure returned.
    Completed,

    /// The entry closure panicked. The payload is kept so `block_on` can
    /// resume the panic on its caller.
    Panicked {
        failure: Failure,
        payload: Option<Box<dyn Any + Send>>,
    },

    /// The fiber never ran to completion because the runtime shut down.
    Aborted,
}

struct Finish {
    stopped: bool,
    outcome: Option<Outcome>,
    hooks: Vec<StopHook>,
    detached: bool,
    observed: bool,
}

/// The part of a fiber visible from any thread.
///
/// Everything in here is guarded by short, non-blocking locks; no hook and
/// no reporter ever runs while a lock is held.
pub(crate) struct Shared {
    id: FiberId,
    name: Mutex<Option<String>>,
    state: AtomicU8,
    finish: Mutex<Finish>,
    reporter: Option<UnobservedHook>,
}

impl Shared {
    pub(crate) fn new(id: FiberId, name: Option<String>, reporter: Option<UnobservedHook>) -> Self {
        Self {
            id,
            name: Mutex::new(name),
            state: AtomicU8::new(State::Ready as u8),
            finish: Mutex::new(Finish {
                stopped: false,
                outcome: None,
                hooks: Vec::new(),
                detached: false,
                observed: false,
            }),
            reporter,
        }
    }

    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    pub(crate) fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.lock() = Some(name);
    }

    pub(crate) fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Mirrors the worker-owned state. Only the owning worker calls this.
    pub(crate) fn publish_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.finish.lock().stopped
    }

    /// Registers `hook` to run when the fiber stops.
    ///
    /// If the fiber has already stopped the hook is handed back unrun.
    pub(crate) fn on_stop(&self, hook: StopHook) -> Result<(), StopHook> {
        let mut finish = self.finish.lock();

        if finish.stopped {
            return Err(hook);
        }

        finish.hooks.push(hook);
        Ok(())
    }

    /// Records how the fiber ended and runs the stop hooks.
    ///
    /// Only the first call has an effect.
    pub(crate) fn finish(&self, outcome: Outcome) {
        let (hooks, unobserved) = {
            let mut finish = self.finish.lock();

            if finish.stopped {
                return;
            }

            let unobserved = match (&outcome, finish.detached) {
                (Outcome::Panicked { failure, .. }, true) => Some(failure.clone()),
                _ => None,
            };

            finish.stopped = true;
            finish.outcome = Some(outcome);
            self.publish_state(State::Stopped);

            (mem::take(&mut finish.hooks), unobserved)
        };

        for hook in hooks {
            hook();
        }

        if let Some(failure) = unobserved {
            self.report_unobserved(&failure);
        }
    }

    /// Takes the outcome, marking any failure as observed.
    ///
    /// Returns `None` if the fiber has not stopped or the outcome was
    /// already taken.
    pub(crate) fn take_outcome(&self) -> Option<Outcome> {
        let mut finish = self.finish.lock();
        finish.observed = true;
        finish.outcome.take()
    }

    /// Called when the last join handle goes away.
    pub(crate) fn detach(&self) {
        let unobserved = {
            let mut finish = self.finish.lock();
            finish.detached = true;

            match &finish.outcome {
                Some(Outcome::Panicked { failure, .. }) if !finish.observed => {
                    Some(failure.clone())
                }
                _ => None,
            }
        };

        if let Some(failure) = unobserved {
            self.report_unobserved(&failure);
        }
    }

    fn report_unobserved(&self, failure: &Failure) {
        warn!(
            fiber = %failure.fiber(),
            name = failure.name().unwrap_or(""),
            message = failure.message(),
            "fiber failed unobserved"
        );

        if let Some(reporter) = &self.reporter {
            reporter(failure);
        }
    }
}
