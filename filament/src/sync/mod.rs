//! Synchronization primitives for fibers.
//!
//! This module provides fiber-aware synchronization tools for the runtime.
//! These primitives suspend the calling fiber instead of the worker thread,
//! so other fibers keep running while one waits.
//!
//! The current primitives include:
//! - [`Mutex`]: mutual exclusion with FIFO handoff to waiters.
//! - [`RecursiveMutex`]: a mutex its owner may lock again.
//! - [`Condvar`]: a condition variable paired with [`Mutex`].
//!
//! ## Design notes
//!
//! - Each primitive keeps a FIFO queue of [`Completion`](crate::Completion)s;
//!   release and notify pop a completion and invoke it.
//! - Primitives can be shared between fibers on different workers through
//!   `Arc`.
//! - Contended calls take the calling [`Fiber`](crate::Fiber); uncontended
//!   ones never suspend.

mod condvar;
mod mutex;
mod recursive_mutex;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
pub use recursive_mutex::{RecursiveMutex, RecursiveMutexGuard};
