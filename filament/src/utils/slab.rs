/// Stable handle to a value stored in a [`Slab`].
///
/// A key carries the generation of the slot at insertion time, so a key
/// that outlives its value is rejected rather than resolving to whatever
/// value reuses the slot later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: usize,
    generation: u64,
}

enum Slot<T> {
    Occupied { generation: u64, value: T },
    Vacant { generation: u64 },
}

/// A generational arena.
///
/// `Slab` stores values in a contiguous vector and hands out [`Key`]s.
/// Freed slots are reused; every reuse bumps the slot generation.
pub(crate) struct Slab<T> {
    /// Storage for values and vacant slots.
    slots: Vec<Slot<T>>,
    /// Stack of vacant indices that can be reused.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab with room for `capacity` values.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts the value built by `make` and returns its key.
    ///
    /// The closure receives the key in advance so the value can refer to
    /// its own slot.
    pub(crate) fn insert_with(&mut self, make: impl FnOnce(Key) -> T) -> Key {
        let key = match self.free.pop() {
            Some(index) => {
                let generation = match &self.slots[index] {
                    Slot::Vacant { generation } => generation + 1,
                    Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
                };
                Key { index, generation }
            }
            None => {
                self.slots.push(Slot::Vacant { generation: 0 });
                Key {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };

        self.slots[key.index] = Slot::Occupied {
            generation: key.generation,
            value: make(key),
        };
        self.len += 1;

        key
    }

    /// Returns a mutable reference to the value at `key`, if it is still live.
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.slots.get_mut(key.index) {
            Some(Slot::Occupied { generation, value }) if *generation == key.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Removes and returns the value at `key`, if it is still live.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        match self.slots.get(key.index) {
            Some(Slot::Occupied { generation, .. }) if *generation == key.generation => {}
            _ => return None,
        }

        let slot = std::mem::replace(
            &mut self.slots[key.index],
            Slot::Vacant {
                generation: key.generation,
            },
        );

        self.free.push(key.index);
        self.len -= 1;

        match slot {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Removes every live value, in slot order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.free.clear();
        self.len = 0;

        self.slots
            .drain(..)
            .filter_map(|slot| match slot {
                Slot::Occupied { value, .. } => Some(value),
                Slot::Vacant { .. } => None,
            })
            .collect()
    }
}
