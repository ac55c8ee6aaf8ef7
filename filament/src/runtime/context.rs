use crate::runtime::handle::Handle;

use std::cell::{Cell, RefCell};

thread_local! {
    /// Handle of the runtime owning the current worker thread.
    ///
    /// This is set for the lifetime of a worker loop and allows
    /// [`Handle::current`] and the free [`spawn`](crate::spawn) to reach the
    /// runtime without explicit parameter passing.
    pub(crate) static CURRENT_HANDLE: RefCell<Option<Handle>> =
        const { RefCell::new(None) };

    /// Thread-local identifier of the current worker thread.
    pub(crate) static CURRENT_WORKER_ID: Cell<Option<usize>> =
        const { Cell::new(None) };
}

/// Enters the runtime execution context for the current thread.
///
/// This function temporarily installs the runtime handle and the worker id
/// for the duration of the closure `f`. After the closure completes, the
/// previous context is restored.
pub(crate) fn enter_context<R>(handle: Handle, worker: usize, f: impl FnOnce() -> R) -> R {
    CURRENT_HANDLE.with(|h| {
        CURRENT_WORKER_ID.with(|w| {
            let prev_h = h.replace(Some(handle));
            let prev_w = w.replace(Some(worker));

            let out = f();

            w.set(prev_w);
            h.replace(prev_h);

            out
        })
    })
}

pub(crate) fn current_handle() -> Option<Handle> {
    CURRENT_HANDLE.with(|h| h.borrow().clone())
}

/// Returns `true` on a worker thread, where blocking the thread would stall
/// every fiber it owns.
pub(crate) fn is_worker_thread() -> bool {
    CURRENT_WORKER_ID.with(|w| w.get().is_some())
}
