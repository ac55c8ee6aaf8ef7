//! Internal data structures.
//!
//! This module provides the generational [`Slab`] arena that workers use to
//! own their fibers. Slots are addressed by a [`Key`] that stays valid for the
//! lifetime of the stored value and never aliases a later occupant.

mod slab;

pub(crate) use slab::{Key, Slab};
