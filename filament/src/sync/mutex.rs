use crate::error::Result;
use crate::runtime::fiber::{Completion, Fiber};

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// A fiber-aware mutex.
///
/// `Mutex<T>` provides mutual exclusion for fibers. Unlike a standard
/// `std::sync::Mutex`, this mutex does not block threads when waiting;
/// fibers that cannot acquire the lock are suspended and resumed when the
/// mutex is handed to them.
///
/// Ownership passes directly from the releasing fiber to the longest
/// waiting one, so waiters acquire in arrival order.
pub struct Mutex<T> {
    /// Lock flag and waiters, guarded by a short internal lock.
    state: parking_lot::Mutex<LockState>,

    /// The underlying data protected by the mutex.
    data: UnsafeCell<T>,
}

struct LockState {
    locked: bool,
    waiters: VecDeque<Completion>,
}

// Safety: access to `data` is serialized by `state.locked`.
unsafe impl<T: Send> Send for Mutex<T> {}
// Safety: a guard only exists while `locked` is held by its fiber.
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new, unlocked mutex wrapping `value`.
    pub fn new(value: T) -> Mutex<T> {
        Self {
            state: parking_lot::Mutex::new(LockState {
                locked: false,
                waiters: VecDeque::new(),
            }),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the mutex, suspending `fiber` while another fiber holds it.
    ///
    /// # Errors
    ///
    /// Fails only if the wait itself fails, e.g. when the runtime shuts
    /// down while the fiber is queued.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let counter = Arc::new(Mutex::new(0));
    ///
    /// let mut guard = counter.lock(fiber)?;
    /// *guard += 1;
    /// ```
    pub fn lock(&self, fiber: &Fiber<'_>) -> Result<MutexGuard<'_, T>> {
        if let Some(guard) = self.try_lock() {
            return Ok(guard);
        }

        fiber.wait(|completion| {
            let mut state = self.state.lock();

            if state.locked {
                state.waiters.push_back(completion);
            } else {
                state.locked = true;
                drop(state);
                let _ = completion.complete(Ok(()));
            }
        })?;

        Ok(MutexGuard::new(self))
    }

    /// Acquires the mutex if it is free.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut state = self.state.lock();

        if state.locked {
            None
        } else {
            state.locked = true;
            Some(MutexGuard::new(self))
        }
    }

    /// Returns `true` while some fiber holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Mutable access without locking; the borrow proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex, returning the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Hands the lock to the next live waiter, or releases it.
    fn unlock(&self) {
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.waiters.pop_front() {
                    Some(next) => next,
                    None => {
                        state.locked = false;
                        return;
                    }
                }
            };

            // A waiter whose worker is gone cannot take the lock.
            if next.complete(Ok(())).is_ok() {
                return;
            }
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mutex")
            .field("locked", &state.locked)
            .field("waiters", &state.waiters.len())
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`Mutex::lock`].
///
/// Releases the mutex when dropped. A guard cannot leave its thread, and
/// is only shared across threads when `T` is `Sync`:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<filament::sync::MutexGuard<'static, u32>>();
/// ```
///
/// ```compile_fail
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<filament::sync::MutexGuard<'static, std::cell::Cell<u32>>>();
/// ```
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,

    /// Guards stay on the fiber, and so the thread, that took the lock.
    _not_send: PhantomData<*const ()>,
}

// Safety: a shared guard only hands out `&T`.
unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T> MutexGuard<'a, T> {
    fn new(mutex: &'a Mutex<T>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Safety: the guard holds the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: the guard holds the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
