use super::{Fiber, FiberId, State};
use crate::error::{Error, Result};
use crate::runtime::executor::message::Message;
use crate::utils::Key;

use parking_lot::Mutex;

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::task::{Context, Poll, Wake, Waker};

use tracing::warn;

/// Single-shot bridge from an asynchronous event back to a blocked fiber.
///
/// A completion is created by [`Fiber::wait`], which commits the fiber to
/// blocking until the completion is invoked. Invoking it, from any thread,
/// routes the status to the fiber's own worker, where the fiber is made
/// runnable and resumed with that status.
///
/// Clones share one firing: the first [`complete`](Self::complete) wins and
/// every later call returns [`Error::CompletionReused`]. Dropping every
/// clone without completing resumes the fiber with
/// [`Error::CompletionAbandoned`].
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

struct Inner {
    fiber: FiberId,
    key: Key,
    token: u64,
    sender: Sender<Message>,
    fired: AtomicBool,
}

impl Completion {
    pub(crate) fn new(fiber: FiberId, key: Key, token: u64, sender: Sender<Message>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fiber,
                key,
                token,
                sender,
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Resumes the waiting fiber with `status`.
    ///
    /// # Errors
    ///
    /// - [`Error::CompletionReused`] if this completion (or a clone) was
    ///   already invoked; the call has no effect.
    /// - [`Error::Shutdown`] if the fiber's worker has stopped.
    pub fn complete(&self, status: Result<()>) -> Result<()> {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            warn!(fiber = %self.inner.fiber, token = self.inner.token, "completion invoked twice");
            return Err(Error::CompletionReused);
        }

        self.inner
            .sender
            .send(Message::Wake {
                key: self.inner.key,
                token: self.inner.token,
                status,
            })
            .map_err(|_| Error::Shutdown)
    }

    /// The fiber this completion resumes.
    pub fn fiber(&self) -> FiberId {
        self.inner.fiber
    }

    /// Returns `true` once the completion has been invoked.
    pub fn is_completed(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("fiber", &self.inner.fiber)
            .field("token", &self.inner.token)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.fired.load(Ordering::Acquire) {
            let _ = self.sender.send(Message::Wake {
                key: self.key,
                token: self.token,
                status: Err(Error::CompletionAbandoned),
            });
        }
    }
}

impl Fiber<'_> {
    /// Blocks the fiber until a completion is invoked.
    ///
    /// `arm` receives the completion and hands it to whatever will signal
    /// the event (a timer, a wait queue, another thread). The fiber then
    /// suspends as [`State::Blocked`]; the status passed to
    /// [`Completion::complete`] is returned here and recorded as
    /// [`last_result`](Fiber::last_result).
    ///
    /// Completing before the fiber has suspended is fine: the wakeup is
    /// queued on the fiber's worker and applied once the fiber has parked.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] when called from inside another
    /// `wait`'s `arm` closure, or whatever status the completion carries.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let status = fiber.wait(|completion| {
    ///     std::thread::spawn(move || {
    ///         let _ = completion.complete(Ok(()));
    ///     });
    /// });
    /// assert!(status.is_ok());
    /// ```
    pub fn wait<F>(&self, arm: F) -> Result<()>
    where
        F: FnOnce(Completion),
    {
        self.ensure_inside()?;

        // A wait nested in another wait's arm would replace its token.
        if self.record().is_arming() {
            return Err(Error::InvalidTransition {
                from: State::Running,
                to: State::Blocked,
            });
        }

        let completion = self.record().arm_completion();
        self.record().arming(|| arm(completion));

        let status = self.suspend(State::Blocked)?;
        self.record().set_last_result(status.clone());

        status
    }

    /// Drives a future to completion from inside the fiber.
    ///
    /// Each time the future is pending the fiber blocks on a completion
    /// that the future's waker invokes.
    pub fn wait_future<F: Future>(&self, future: F) -> Result<F::Output> {
        let mut future = pin!(future);

        let signal = Arc::new(Signal::default());
        let waker = Waker::from(signal.clone());
        let mut cx = Context::from_waker(&waker);

        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Ok(output);
            }

            self.wait(|completion| signal.arm(completion))?;
        }
    }
}

#[derive(Default)]
enum SignalState {
    #[default]
    Idle,
    Notified,
    Armed(Completion),
}

/// Waker target that turns future wakeups into completions.
///
/// A wakeup that arrives before the completion is armed is remembered and
/// fires the completion as soon as it is armed.
#[derive(Default)]
struct Signal {
    state: Mutex<SignalState>,
}

impl Signal {
    fn arm(&self, completion: Completion) {
        let mut state = self.state.lock();

        match mem::take(&mut *state) {
            SignalState::Notified => {
                drop(state);
                let _ = completion.complete(Ok(()));
            }
            SignalState::Idle | SignalState::Armed(_) => {
                *state = SignalState::Armed(completion);
            }
        }
    }
}

impl Wake for Signal {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let armed = {
            let mut state = self.state.lock();

            match mem::replace(&mut *state, SignalState::Notified) {
                SignalState::Armed(completion) => {
                    *state = SignalState::Idle;
                    Some(completion)
                }
                SignalState::Idle | SignalState::Notified => None,
            }
        };

        if let Some(completion) = armed {
            let _ = completion.complete(Ok(()));
        }
    }
}
