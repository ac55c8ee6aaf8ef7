//! # Filament
//!
//! **Filament** is a stackful fiber runtime for Rust: cooperatively scheduled
//! lightweight threads layered on an asynchronous timer reactor.
//!
//! Code running in a fiber is ordinary blocking-style code. When a fiber waits
//! (for a timer, another fiber, a lock, or any external event bridged through a
//! [`Completion`]) only the fiber suspends; its worker thread moves on to the
//! next runnable fiber. When the event fires, possibly on another OS thread,
//! the fiber is resumed on the worker that owns it with the event's status.
//!
//! Filament offers:
//!
//! - A **multi-threaded executor** where each fiber is pinned to one worker
//! - **Completions**, single-shot callbacks that resume a blocked fiber
//! - **Timers** via [`Fiber::sleep`] and a swappable [`Clock`](time::Clock)
//! - **Joining** with failure propagation through [`Fiber::join_and_rethrow`]
//! - **Fiber-local storage** and per-fiber **cleanup functions**
//! - **Synchronization primitives** in [`sync`]
//! - **Ergonomic macros** `#[filament::main]` and `#[filament::test]`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! #[filament::main]
//! fn main(fiber: &filament::Fiber) {
//!     // Spawn a background fiber
//!     let handle = fiber.spawn(|fiber| {
//!         fiber.sleep(Duration::from_millis(100)).unwrap();
//!         println!("Fiber completed!");
//!     });
//!
//!     // Wait for the fiber to finish
//!     fiber.join(&handle).unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`fiber`]: fibers, join handles, completions and local storage
//! - [`sync`]: fiber-aware mutexes and condition variables
//! - [`time`]: clocks used for sleeping
//!
//! ## Logging
//!
//! Filament emits [`tracing`](https://docs.rs/tracing) events and installs no
//! subscriber. Worker threads run inside a `worker` span.

mod error;
mod reactor;
mod runtime;
mod utils;

pub mod sync;
pub mod time;

pub use error::{Error, Result};
pub use runtime::fiber;
pub use runtime::fiber::{Builder, Completion, Failure, Fiber, FiberId, JoinHandle, LocalKey, State, spawn};
pub use runtime::{DEFAULT_STACK_SIZE, Handle, MIN_STACK_SIZE, Runtime, RuntimeBuilder};

pub use filament_macros::*;
