//! Fiber executor implementation.
//!
//! This module contains the components that own and run fibers:
//! - [`core`]: worker thread startup and lifecycle management,
//! - [`worker`]: the per-thread loop that resumes fibers,
//! - [`message`]: the inbox protocol other threads use to reach a worker.
//!
//! Every fiber belongs to exactly one worker for its whole life. All of its
//! state changes happen on that worker, either directly while it runs or
//! through messages drained between two resumptions.

pub(crate) mod core;
pub(crate) mod message;
pub(crate) mod worker;
