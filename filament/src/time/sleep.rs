use crate::error::Result;
use crate::runtime::fiber::Fiber;

use std::time::{Duration, Instant};

/// Longest sleep honoured as a real deadline; anything longer is clamped.
const MAX_SLEEP: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

impl Fiber<'_> {
    /// Suspends the fiber for at least `duration`.
    ///
    /// Other fibers on the same worker keep running meanwhile. The deadline
    /// is measured against the runtime's [`Clock`](crate::time::Clock).
    ///
    /// # Errors
    ///
    /// [`Error::Shutdown`](crate::Error::Shutdown) if the runtime stops
    /// before the timer fires.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use std::time::Duration;
    ///
    /// fiber.sleep(Duration::from_millis(10))?;
    /// ```
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let now = self.handle().now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| farthest_deadline(now));

        self.sleep_until(deadline)
    }

    /// Suspends the fiber until `deadline` has passed.
    ///
    /// A deadline already in the past still goes through the timer, so the
    /// call always suspends at least once.
    pub fn sleep_until(&self, deadline: Instant) -> Result<()> {
        let reactor = self.handle().reactor().clone();
        let mut armed = Ok(());

        let woken = self.wait(|completion| {
            armed = reactor.set_timer(deadline, move |status| {
                let _ = completion.complete(status);
            });
        });

        // A timer that was never armed abandons its completion; report the
        // arming error instead.
        let status = armed.and(woken);
        self.record().set_last_result(status.clone());

        status
    }
}

/// The latest representable deadline no further than `MAX_SLEEP` away.
fn farthest_deadline(now: Instant) -> Instant {
    let mut cap = MAX_SLEEP;

    loop {
        if let Some(deadline) = now.checked_add(cap) {
            return deadline;
        }
        cap /= 2;
    }
}
