use crate::error::Result;

use std::time::Instant;

/// Single-shot callback run by the reactor when a timer fires or is failed.
pub(crate) type TimerCallback = Box<dyn FnOnce(Result<()>) + Send>;

pub(crate) enum Command {
    SetTimer {
        deadline: Instant,
        callback: TimerCallback,
    },
    Shutdown,
}
