//! Fibers: stackful units of execution scheduled by the runtime.
//!
//! A fiber runs an ordinary closure on its own stack. It suspends only at
//! explicit points (yielding, waiting on a [`Completion`], sleeping, joining,
//! taking a contended lock) and is always resumed on the worker thread that
//! created it.
//!
//! This module provides:
//! - [`Fiber`], the in-body context every entry closure receives,
//! - [`JoinHandle`], to observe a fiber from the outside,
//! - [`Builder`], to name a fiber or size its stack before spawning,
//! - [`Completion`], the single-shot bridge from async events to fibers,
//! - [`LocalKey`], for fiber-local storage.

mod builder;
mod completion;
mod core;
mod handle;
mod id;
mod local;
mod state;
mod this;

pub(crate) mod shared;

pub(crate) use self::core::FiberObject;

pub use builder::Builder;
pub use completion::Completion;
pub use handle::JoinHandle;
pub use id::FiberId;
pub use local::LocalKey;
pub use shared::Failure;
pub use state::State;
pub use this::Fiber;

use crate::error::Result;

/// Spawns a fiber on the current runtime.
///
/// # Errors
///
/// [`Error::NoRuntime`](crate::Error::NoRuntime) when called from a thread
/// that is not a worker of a runtime. Use [`Runtime::spawn`](crate::Runtime::spawn)
/// or [`Fiber::spawn`] there instead.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = filament::spawn(|fiber| {
///     fiber.yield_now().unwrap();
///     40 + 2
/// })?;
/// ```
pub fn spawn<F, T>(f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
    T: Send + 'static,
{
    Builder::new().spawn(f)
}
