use parking_lot::Mutex;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of time for the reactor and for [`Fiber::sleep`].
///
/// The runtime reads every deadline through its clock, which lets tests
/// replace wall-clock time with a [`ManualClock`].
///
/// [`Fiber::sleep`]: crate::Fiber::sleep
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Returns how long the reactor may park before `deadline` must be
    /// checked again.
    fn park_timeout(&self, deadline: Instant) -> Duration {
        deadline.saturating_duration_since(self.now())
    }
}

/// The monotonic system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test keeps one clone and gives another
/// to [`RuntimeBuilder::clock`].
///
/// # Examples
///
/// ```rust,ignore
/// let clock = ManualClock::new();
/// let runtime = RuntimeBuilder::new().clock(clock.clone()).build();
///
/// let sleeper = runtime.spawn(|fiber| fiber.sleep(Duration::from_secs(60)));
/// clock.advance(Duration::from_secs(60));
/// sleeper.join_blocking()??;
/// ```
///
/// [`RuntimeBuilder::clock`]: crate::RuntimeBuilder::clock
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

/// Interval at which the reactor re-reads a manual clock while timers are
/// pending.
const MANUAL_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &*self.now.lock())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    fn park_timeout(&self, deadline: Instant) -> Duration {
        if deadline <= self.now() {
            Duration::ZERO
        } else {
            MANUAL_POLL_INTERVAL
        }
    }
}
