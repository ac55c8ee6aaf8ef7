//! Time sources and sleeping.
//!
//! This module provides the [`Clock`] abstraction used by the reactor and
//! the sleep operations available on [`Fiber`](crate::Fiber):
//! - [`SystemClock`], the default monotonic clock,
//! - [`ManualClock`], a controllable clock for deterministic tests.

mod clock;
mod sleep;

#[doc(inline)]
pub use clock::{Clock, ManualClock, SystemClock};
