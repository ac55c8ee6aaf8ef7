use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// A key for fiber-local storage.
///
/// Keys are declared as statics and identify one storage slot in every
/// fiber. Values are per fiber: setting a value in one fiber is invisible
/// to all others.
///
/// # Examples
///
/// ```rust,ignore
/// static REQUEST_ID: LocalKey<u64> = LocalKey::new("request-id");
///
/// runtime.block_on(|fiber| {
///     fiber.set_local(&REQUEST_ID, 7);
///     assert_eq!(fiber.get_local(&REQUEST_ID), Some(7));
/// });
/// ```
pub struct LocalKey<T: 'static> {
    name: &'static str,
    id: OnceLock<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> LocalKey<T> {
    /// Declares a new key. `name` is only used for debugging.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            id: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    /// The debugging name given at declaration.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn id(&self) -> u64 {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        *self.id.get_or_init(|| NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T: 'static> fmt::Debug for LocalKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKey").field("name", &self.name).finish()
    }
}

type Destructor = Box<dyn FnOnce(Box<dyn Any>)>;

/// A type-erased value together with the destructor that consumes it.
pub(crate) struct Slot {
    value: Box<dyn Any>,
    destructor: Option<Destructor>,
}

impl Slot {
    pub(crate) fn new<T: 'static>(value: T, destructor: Option<Box<dyn FnOnce(T)>>) -> Self {
        let destructor = destructor.map(|destructor| -> Destructor {
            Box::new(move |value: Box<dyn Any>| {
                if let Ok(value) = value.downcast::<T>() {
                    destructor(*value);
                }
            })
        });

        Self {
            value: Box::new(value),
            destructor,
        }
    }

    pub(crate) fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Extracts the value without running the destructor.
    pub(crate) fn into_value<T: 'static>(self) -> Option<T> {
        self.value.downcast().ok().map(|value| *value)
    }

    /// Runs the destructor, or drops the value if there is none.
    ///
    /// A panicking destructor is contained and logged.
    pub(crate) fn destroy(self) {
        let Slot { value, destructor } = self;

        let result = panic::catch_unwind(AssertUnwindSafe(move || match destructor {
            Some(destructor) => destructor(value),
            None => drop(value),
        }));

        if result.is_err() {
            warn!("fiber-local destructor panicked");
        }
    }
}

/// Per-fiber map from key id to slot.
#[derive(Default)]
pub(crate) struct LocalStorage {
    slots: HashMap<u64, Slot>,
}

impl LocalStorage {
    /// Installs `slot`, returning the entry it replaced.
    pub(crate) fn insert(&mut self, id: u64, slot: Slot) -> Option<Slot> {
        self.slots.insert(id, slot)
    }

    pub(crate) fn get(&self, id: u64) -> Option<&Slot> {
        self.slots.get(&id)
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Slot> {
        self.slots.remove(&id)
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    /// Removes every entry so the caller can destroy them without holding
    /// a borrow of the storage.
    pub(crate) fn take_all(&mut self) -> Vec<Slot> {
        self.slots.drain().map(|(_, slot)| slot).collect()
    }
}

impl Drop for LocalStorage {
    fn drop(&mut self) {
        for slot in self.take_all() {
            slot.destroy();
        }
    }
}
