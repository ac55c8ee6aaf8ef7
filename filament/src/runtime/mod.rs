//! Core runtime components.
//!
//! This module contains the fundamental building blocks of the runtime,
//! including fiber execution, scheduling, and the runtime context.
//!
//! It is responsible for:
//! - creating and resuming stackful fibers,
//! - owning each fiber on exactly one worker thread,
//! - routing completions back to the worker owning the fiber,
//! - providing runtime context for spawning from inside fibers.
//!
//! Most users will interact with [`Runtime`], [`Fiber`](crate::Fiber) and
//! [`JoinHandle`](crate::JoinHandle) rather than with this module directly.

mod core;
mod handle;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod executor;

pub mod fiber;

pub use self::core::Runtime;
pub use builder::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE, RuntimeBuilder};
pub use handle::Handle;
