//! Reactor core and timer handling.
//!
//! The reactor is a dedicated thread that owns the runtime's timers.
//! It is responsible for:
//! - receiving timer registrations through a command channel,
//! - firing each timer's single-shot callback once its deadline passes
//!   on the runtime [`Clock`](crate::time::Clock),
//! - failing outstanding timers with [`Error::Shutdown`](crate::Error::Shutdown)
//!   when the runtime stops.
//!
//! The reactor never touches fiber state. Callbacks invoke completions,
//! which marshal the wakeup onto the fiber's own worker.

mod core;
mod timer;

pub(crate) mod command;

pub(crate) use core::{Reactor, ReactorHandle};
