use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of a fiber.
///
/// Identifiers are never reused, even after the fiber has stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(NonZeroU64);

impl FiberId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        let raw = NEXT.fetch_add(1, Ordering::Relaxed);
        FiberId(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Returns the identifier as a plain integer.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
