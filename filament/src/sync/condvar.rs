use super::mutex::MutexGuard;
use crate::error::Result;
use crate::runtime::fiber::{Completion, Fiber};

use parking_lot::Mutex;

use std::collections::VecDeque;
use std::fmt;

/// A condition variable for fibers.
///
/// Waiting releases the associated [`Mutex`](super::Mutex) and suspends the
/// fiber until it is notified, then reacquires the mutex before returning.
/// Like any condition variable it may be paired with a predicate; use
/// [`wait_while`](Self::wait_while) to loop on one.
#[derive(Default)]
pub struct Condvar {
    waiters: Mutex<VecDeque<Completion>>,
}

impl Condvar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases `guard`, waits for a notification, then relocks.
    ///
    /// The fiber is queued before the mutex is released, so a notification
    /// sent by the next owner of the mutex is never missed.
    pub fn wait<'a, T>(&self, fiber: &Fiber<'_>, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>> {
        let mutex = guard.mutex();

        fiber.wait(|completion| {
            self.waiters.lock().push_back(completion);
            drop(guard);
        })?;

        mutex.lock(fiber)
    }

    /// Waits until `condition` returns `false` for the protected value.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let mut ready = cvar.wait_while(fiber, flag.lock(fiber)?, |ready| !*ready)?;
    /// ```
    pub fn wait_while<'a, T, F>(
        &self,
        fiber: &Fiber<'_>,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
    ) -> Result<MutexGuard<'a, T>>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(fiber, guard)?;
        }

        Ok(guard)
    }

    /// Wakes the longest waiting fiber, if any.
    ///
    /// Returns `true` if a fiber was woken.
    pub fn notify_one(&self) -> bool {
        loop {
            let next = self.waiters.lock().pop_front();

            match next {
                Some(completion) => {
                    if completion.complete(Ok(())).is_ok() {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }

    /// Wakes every waiting fiber, returning how many were woken.
    pub fn notify_all(&self) -> usize {
        let waiters: Vec<_> = self.waiters.lock().drain(..).collect();

        waiters
            .into_iter()
            .filter(|completion| completion.complete(Ok(())).is_ok())
            .count()
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar")
            .field("waiters", &self.waiters.lock().len())
            .finish()
    }
}
