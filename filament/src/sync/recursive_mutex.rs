use crate::error::Result;
use crate::runtime::fiber::{Completion, Fiber, FiberId};

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// A mutex that the owning fiber may lock again without deadlocking.
///
/// The lock is released once every guard of the owner is dropped. Guards
/// only give shared access, since nested guards alias the same value; wrap
/// the value in a `RefCell` to mutate it.
pub struct RecursiveMutex<T> {
    state: parking_lot::Mutex<OwnerState>,
    data: UnsafeCell<T>,
}

struct OwnerState {
    owner: Option<FiberId>,
    depth: usize,
    waiters: VecDeque<(FiberId, Completion)>,
}

// Safety: the protected value is only reachable by the owning fiber, which
// runs on exactly one thread at a time.
unsafe impl<T: Send> Send for RecursiveMutex<T> {}
// Safety: see above; guards never leave the owning fiber's body.
unsafe impl<T: Send> Sync for RecursiveMutex<T> {}

impl<T> RecursiveMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: parking_lot::Mutex::new(OwnerState {
                owner: None,
                depth: 0,
                waiters: VecDeque::new(),
            }),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the mutex for `fiber`, or increases the lock depth if
    /// `fiber` already owns it.
    pub fn lock(&self, fiber: &Fiber<'_>) -> Result<RecursiveMutexGuard<'_, T>> {
        let me = fiber.id();

        if let Some(guard) = self.try_lock(fiber) {
            return Ok(guard);
        }

        fiber.wait(|completion| {
            let mut state = self.state.lock();

            if state.owner.is_none() {
                state.owner = Some(me);
                state.depth = 1;
                drop(state);
                let _ = completion.complete(Ok(()));
            } else {
                state.waiters.push_back((me, completion));
            }
        })?;

        Ok(RecursiveMutexGuard::new(self))
    }

    /// Acquires without suspending, if the mutex is free or owned by `fiber`.
    pub fn try_lock(&self, fiber: &Fiber<'_>) -> Option<RecursiveMutexGuard<'_, T>> {
        let me = fiber.id();
        let mut state = self.state.lock();

        match state.owner {
            Some(owner) if owner == me => state.depth += 1,
            None => {
                state.owner = Some(me);
                state.depth = 1;
            }
            Some(_) => return None,
        }

        Some(RecursiveMutexGuard::new(self))
    }

    /// Current owner, if locked.
    pub fn owner(&self) -> Option<FiberId> {
        self.state.lock().owner
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn unlock(&self) {
        let mut state = self.state.lock();
        state.depth -= 1;

        if state.depth > 0 {
            return;
        }

        while let Some((next, completion)) = state.waiters.pop_front() {
            state.owner = Some(next);
            state.depth = 1;

            drop(state);
            if completion.complete(Ok(())).is_ok() {
                return;
            }
            state = self.state.lock();
        }

        state.owner = None;
        state.depth = 0;
    }
}

impl<T> fmt::Debug for RecursiveMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RecursiveMutex")
            .field("owner", &state.owner)
            .field("depth", &state.depth)
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`RecursiveMutex::lock`].
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<filament::sync::RecursiveMutexGuard<'static, u32>>();
/// ```
pub struct RecursiveMutexGuard<'a, T> {
    mutex: &'a RecursiveMutex<T>,

    /// Guards stay on the fiber, and so the thread, that took the lock.
    _not_send: PhantomData<*const ()>,
}

// Safety: a shared guard only hands out `&T`.
unsafe impl<T: Sync> Sync for RecursiveMutexGuard<'_, T> {}

impl<'a, T> RecursiveMutexGuard<'a, T> {
    fn new(mutex: &'a RecursiveMutex<T>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T> Drop for RecursiveMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<T> Deref for RecursiveMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Safety: the guard's fiber owns the mutex.
        unsafe { &*self.mutex.data.get() }
    }
}
