use super::core::Record;
use super::local::{LocalKey, Slot};
use super::shared::StopHook;
use super::{FiberId, JoinHandle, State};
use crate::error::{Error, Result};
use crate::runtime::Handle;

use corosensei::Yielder;

use std::fmt;
use std::rc::Rc;

/// The running fiber, as seen from inside its own body.
///
/// A `Fiber` is handed to every entry closure and is the only way to
/// suspend: it cannot be sent, stored past the closure, or used from any
/// other fiber. Blocking operations ([`wait`](Fiber::wait),
/// [`sleep`](Fiber::sleep), [`join`](Fiber::join), the lock types in
/// [`sync`](crate::sync)) all take it explicitly.
///
/// # Examples
///
/// ```rust
/// use filament::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new().build();
///
/// runtime.block_on(|fiber| {
///     fiber.set_name("root");
///     fiber.yield_now().unwrap();
///     assert_eq!(fiber.name().as_deref(), Some("root"));
/// });
/// ```
pub struct Fiber<'a> {
    yielder: &'a Yielder<Result<()>, State>,
    record: Rc<Record>,
}

impl<'a> Fiber<'a> {
    pub(crate) fn new(yielder: &'a Yielder<Result<()>, State>, record: Rc<Record>) -> Self {
        Self { yielder, record }
    }

    pub(crate) fn record(&self) -> &Record {
        &self.record
    }

    pub(crate) fn ensure_inside(&self) -> Result<()> {
        if self.record.is_inside() {
            Ok(())
        } else {
            Err(Error::NotInFiber)
        }
    }

    /// Parks the body in `next` and hands control back to the worker.
    ///
    /// The worker applies `next` only after the stack switch, so a wakeup
    /// racing with the suspension is never lost. The inner result is the
    /// status the fiber was resumed with.
    pub(crate) fn suspend(&self, next: State) -> Result<Result<()>> {
        self.ensure_inside()?;

        if self.record.is_arming() || !matches!(next, State::Ready | State::Blocked) {
            return Err(Error::InvalidTransition {
                from: State::Running,
                to: next,
            });
        }

        self.record.set_inside(false);
        let status = self.yielder.suspend(next);
        self.record.set_inside(true);

        Ok(status)
    }

    /// This fiber's identifier.
    pub fn id(&self) -> FiberId {
        self.record.id()
    }

    /// This fiber's name, if one was set.
    pub fn name(&self) -> Option<String> {
        self.record.shared().name()
    }

    /// Renames this fiber. The name shows up in failures and logs.
    pub fn set_name(&self, name: impl Into<String>) {
        self.record.shared().set_name(name.into());
    }

    /// Always [`State::Running`]: a fiber only observes itself while running.
    pub fn state(&self) -> State {
        self.record.shared().state()
    }

    /// Moves this fiber out of `Running`, suspending it.
    ///
    /// `Ready` re-queues the fiber behind every other runnable fiber on the
    /// same worker. `Blocked` parks it until a completion targets it; prefer
    /// [`wait`](Fiber::wait), which hands out that completion.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] for any other target state, and for
    /// calls made while a completion is being armed.
    pub fn set_state(&self, next: State) -> Result<()> {
        self.suspend(next)?
    }

    /// Lets every other runnable fiber on this worker run once.
    pub fn yield_now(&self) -> Result<()> {
        self.set_state(State::Ready)
    }

    /// Status of the most recent [`wait`](Fiber::wait).
    ///
    /// `Ok(())` until the fiber has waited at least once.
    pub fn last_result(&self) -> Result<()> {
        self.record.last_result()
    }

    /// The runtime this fiber runs on.
    pub fn handle(&self) -> &Handle {
        self.record.handle()
    }

    /// Spawns a fiber on the same runtime.
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle().spawn(f)
    }

    /// Blocks until `other` has stopped.
    ///
    /// Returns `Ok(())` however `other` ended; use
    /// [`join_and_rethrow`](Fiber::join_and_rethrow) to get its output.
    ///
    /// # Errors
    ///
    /// [`Error::JoinSelf`] if `other` is this fiber.
    pub fn join<T>(&self, other: &JoinHandle<T>) -> Result<()> {
        self.ensure_inside()?;

        if other.id() == self.id() {
            return Err(Error::JoinSelf);
        }

        let shared = other.shared();
        if shared.is_stopped() {
            return Ok(());
        }

        self.wait(|completion| {
            let hook: StopHook = Box::new(move || {
                let _ = completion.complete(Ok(()));
            });

            if let Err(hook) = shared.on_stop(hook) {
                hook();
            }
        })
    }

    /// Joins `other` and returns its output.
    ///
    /// # Errors
    ///
    /// - [`Error::Panicked`] if `other` panicked; the failure counts as
    ///   observed.
    /// - [`Error::Shutdown`] if the runtime stopped before `other` finished.
    pub fn join_and_rethrow<T>(&self, other: JoinHandle<T>) -> Result<T> {
        self.join(&other)?;
        other.into_result()
    }

    /// Registers `f` to run after the entry closure returns or panics.
    ///
    /// Cleanup functions run in registration order, before fiber-local
    /// destructors and before any joiner is released.
    pub fn add_cleanup_function(&self, f: impl FnOnce() + 'static) {
        self.record.push_cleanup(Box::new(f));
    }

    /// Stores `value` under `key`, dropping any previous value.
    pub fn set_local<T: 'static>(&self, key: &'static LocalKey<T>, value: T) {
        self.install(key, Slot::new(value, None));
    }

    /// Stores `value` under `key` with a destructor that consumes it when
    /// the fiber stops or the entry is replaced.
    pub fn set_local_with<T, D>(&self, key: &'static LocalKey<T>, value: T, destructor: D)
    where
        T: 'static,
        D: FnOnce(T) + 'static,
    {
        self.install(key, Slot::new(value, Some(Box::new(destructor))));
    }

    fn install<T: 'static>(&self, key: &'static LocalKey<T>, slot: Slot) {
        let previous = self.record.storage.borrow_mut().insert(key.id(), slot);

        if let Some(previous) = previous {
            previous.destroy();
        }
    }

    /// A copy of the value stored under `key`.
    pub fn get_local<T: Clone + 'static>(&self, key: &'static LocalKey<T>) -> Option<T> {
        self.with_local(key, T::clone)
    }

    /// Runs `f` with a reference to the value stored under `key`.
    ///
    /// The storage is borrowed for the duration of `f`; touching fiber-local
    /// storage from inside `f` panics.
    pub fn with_local<T: 'static, R>(
        &self,
        key: &'static LocalKey<T>,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let storage = self.record.storage.borrow();
        storage.get(key.id()).and_then(|slot| slot.value::<T>()).map(f)
    }

    /// Removes the value stored under `key` without running its destructor.
    pub fn take_local<T: 'static>(&self, key: &'static LocalKey<T>) -> Option<T> {
        let slot = self.record.storage.borrow_mut().remove(key.id());
        slot.and_then(|slot| slot.into_value::<T>())
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn has_local<T: 'static>(&self, key: &'static LocalKey<T>) -> bool {
        self.record.storage.borrow().contains(key.id())
    }
}

impl fmt::Debug for Fiber<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
