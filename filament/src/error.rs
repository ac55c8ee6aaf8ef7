use crate::runtime::fiber::{Failure, State};

use std::io;

use thiserror::Error;

/// A specialized `Result` for fiber operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the runtime.
///
/// Errors are plain values: a failing asynchronous wait delivers one to the
/// suspended fiber, and contract violations (joining oneself, reusing a
/// completion, ...) are returned instead of asserted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The operation needs the execution context of a running fiber.
    #[error("operation must be called from inside a running fiber")]
    NotInFiber,

    /// No runtime is installed on the calling thread.
    #[error("no filament runtime is active on this thread")]
    NoRuntime,

    /// A blocking wait was issued on a worker thread, which would stall every
    /// fiber owned by that worker.
    #[error("blocking wait issued on a worker thread")]
    BlockingOnWorker,

    /// The requested state change is not part of the fiber state machine.
    #[error("invalid fiber state transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// State the fiber was in.
        from: State,
        /// State that was requested.
        to: State,
    },

    /// A completion was invoked more than once.
    #[error("completion was already invoked")]
    CompletionReused,

    /// Every copy of a completion was dropped before it was invoked.
    #[error("completion was dropped without being invoked")]
    CompletionAbandoned,

    /// A fiber tried to join itself.
    #[error("a fiber cannot join itself")]
    JoinSelf,

    /// The runtime (or the part of it the operation needs) has shut down.
    #[error("runtime is shutting down")]
    Shutdown,

    /// A runtime thread could not be started.
    #[error("failed to spawn runtime thread: {0:?}")]
    Spawn(io::ErrorKind),

    /// An I/O error delivered by a completion.
    #[error("i/o error: {0:?}")]
    Io(io::ErrorKind),

    /// The joined fiber panicked.
    #[error("{0}")]
    Panicked(Failure),

    /// Any other failure delivered by a completion.
    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.kind())
    }
}
