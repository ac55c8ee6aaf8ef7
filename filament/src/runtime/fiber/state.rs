/// Lifecycle state of a fiber.
///
/// Valid transitions are:
///
/// ```text
/// Ready -> Running -> Blocked -> Ready
///             |   \
///             |    -> Ready      (yield)
///             v
///          Stopped               (absorbing)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// Runnable and waiting for its next slice on the worker.
    Ready = 0,

    /// Currently executing on its worker.
    ///
    /// At most one fiber per worker observes this state at a time.
    Running = 1,

    /// Suspended until a completion wakes it.
    Blocked = 2,

    /// The entry closure has returned or panicked and teardown is complete.
    Stopped = 3,
}

impl State {
    /// Returns `true` if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Ready, State::Running)
                | (State::Running, State::Blocked)
                | (State::Running, State::Ready)
                | (State::Running, State::Stopped)
                | (State::Blocked, State::Ready)
        )
    }

    /// Returns `true` for [`State::Stopped`].
    pub fn is_stopped(self) -> bool {
        self == State::Stopped
    }

    pub(crate) fn from_u8(value: u8) -> State {
        match value {
            0 => State::Ready,
            1 => State::Running,
            2 => State::Blocked,
            _ => State::Stopped,
        }
    }
}
