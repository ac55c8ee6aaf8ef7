use super::command::{Command, TimerCallback};
use super::timer::TimerEntry;
use crate::error::{Error, Result};
use crate::time::Clock;

use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::Instant;

use tracing::{debug, trace};

/// Cloneable handle used to send commands to the reactor thread.
#[derive(Clone)]
pub(crate) struct ReactorHandle {
    sender: Sender<Command>,
    clock: Arc<dyn Clock>,
}

impl ReactorHandle {
    /// Registers a timer whose `callback` runs once `deadline` has passed.
    ///
    /// The callback receives `Ok(())` when the timer fires, or
    /// [`Error::Shutdown`] if the reactor stops first. If the reactor is
    /// already gone the callback is dropped and `Error::Shutdown` returned.
    pub(crate) fn set_timer(
        &self,
        deadline: Instant,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<()> {
        self.sender
            .send(Command::SetTimer {
                deadline,
                callback: Box::new(callback),
            })
            .map_err(|_| Error::Shutdown)
    }

    /// Asks the reactor thread to stop.
    pub(crate) fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
    }

    /// The clock every deadline is measured against.
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

pub(crate) struct Reactor {
    receiver: Receiver<Command>,
    clock: Arc<dyn Clock>,
    timers: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl Reactor {
    /// Spawns the reactor thread.
    pub(crate) fn start(
        clock: Arc<dyn Clock>,
    ) -> Result<(ReactorHandle, thread::JoinHandle<()>)> {
        let (sender, receiver) = channel();

        let reactor = Reactor {
            receiver,
            clock: clock.clone(),
            timers: BinaryHeap::new(),
            seq: 0,
        };

        let thread = thread::Builder::new()
            .name("filament-reactor".into())
            .spawn(move || reactor.run())
            .map_err(|err| Error::Spawn(err.kind()))?;

        Ok((ReactorHandle { sender, clock }, thread))
    }

    fn run(mut self) {
        debug!("reactor started");

        loop {
            self.fire_due();

            let command = match self.timers.peek() {
                Some(next) => {
                    let timeout = self.clock.park_timeout(next.deadline);
                    match self.receiver.recv_timeout(timeout) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            let mut pending = command;
            while let Some(command) = pending {
                match command {
                    Command::SetTimer { deadline, callback } => self.push(deadline, callback),
                    Command::Shutdown => {
                        self.fail_all();
                        debug!("reactor stopped");
                        return;
                    }
                }

                pending = self.receiver.try_recv().ok();
            }
        }

        self.fail_all();
        debug!("reactor stopped");
    }

    fn push(&mut self, deadline: Instant, callback: TimerCallback) {
        self.seq += 1;
        trace!(seq = self.seq, "timer registered");

        self.timers.push(TimerEntry {
            deadline,
            seq: self.seq,
            callback,
        });
    }

    fn fire_due(&mut self) {
        let now = self.clock.now();

        while self.timers.peek().is_some_and(|timer| timer.deadline <= now) {
            if let Some(timer) = self.timers.pop() {
                trace!(seq = timer.seq, "timer fired");
                (timer.callback)(Ok(()));
            }
        }
    }

    fn fail_all(&mut self) {
        for timer in self.timers.drain() {
            (timer.callback)(Err(Error::Shutdown));
        }
    }
}
