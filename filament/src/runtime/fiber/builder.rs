use super::shared::Shared;
use super::{Fiber, FiberId, JoinHandle};
use crate::error::Result;
use crate::runtime::Handle;
use crate::runtime::executor::message::SpawnRequest;

use parking_lot::Mutex;

use std::sync::Arc;

/// Fiber factory, used to configure a fiber before spawning it.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = Builder::new()
///     .name("accept-loop")
///     .stack_size(64 * 1024)
///     .spawn(|fiber| fiber.id())?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the fiber.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the runtime's default stack size for this fiber.
    ///
    /// Sizes below [`MIN_STACK_SIZE`](crate::MIN_STACK_SIZE) are
    /// rounded up.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Spawns the fiber on the runtime owning the current worker thread.
    ///
    /// # Errors
    ///
    /// [`Error::NoRuntime`](crate::Error::NoRuntime) outside a runtime.
    pub fn spawn<F, T>(self, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = Handle::current()?;
        Ok(self.spawn_on(&handle, f))
    }

    /// Spawns the fiber on the runtime behind `handle`.
    pub fn spawn_on<F, T>(self, handle: &Handle, f: F) -> JoinHandle<T>
    where
        F: FnOnce(&Fiber<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::new(Shared::new(FiberId::next(), self.name, handle.reporter()));
        let output = Arc::new(Mutex::new(None));

        let slot = output.clone();
        let entry = Box::new(move |fiber: &Fiber<'_>| {
            let value = f(fiber);
            *slot.lock() = Some(value);
        });

        let stack_size = self
            .stack_size
            .unwrap_or_else(|| handle.default_stack_size())
            .max(crate::MIN_STACK_SIZE);

        handle.submit(SpawnRequest::new(entry, shared.clone(), stack_size));

        JoinHandle::new(shared, output)
    }
}
