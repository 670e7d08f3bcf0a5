//! Generational slot arena for [`Control`]s
//!
//! Controls are addressed by [`ControlKey`]: a slot index plus a
//! generation counter. A key taken from a destroyed control never
//! aliases its slot's next occupant; lookups on such a stale key
//! return `None`, and direct indexing panics (precondition violation,
//! not a recoverable state).

use super::control::Control;
use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};

/// Stable handle to a control slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ControlKey {
    index: u32,
    generation: NonZeroU32,
}

impl ControlKey {
    /// The slot index; only meaningful for logging.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// A `ControlKey` that may be absent, in the size of a key.
///
/// Sibling links and marginal slots store these; `Default` is the
/// absent state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OptionalControlKey(Option<ControlKey>);

impl OptionalControlKey {
    pub const NONE: Self = Self(None);

    pub fn get(self) -> Option<ControlKey> {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0.is_none()
    }
}

impl From<ControlKey> for OptionalControlKey {
    fn from(key: ControlKey) -> Self {
        Self(Some(key))
    }
}

impl From<Option<ControlKey>> for OptionalControlKey {
    fn from(key: Option<ControlKey>) -> Self {
        Self(key)
    }
}

enum Slot {
    Occupied { generation: NonZeroU32, control: Box<Control> },
    Free { generation: u32, next_free: Option<u32> },
}

/// The slot store. Structural operations live on
/// [`ControlTree`](super::tree::ControlTree), which wraps this.
pub struct Arena {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    len: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of live controls.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a control and returns its key.
    pub fn insert(&mut self, control: Control) -> ControlKey {
        self.len += 1;
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (generation, next_free) = match *slot {
                    Slot::Free { generation, next_free } => (generation, next_free),
                    Slot::Occupied { .. } => unreachable!("occupied slot on free list"),
                };
                // generation was already bumped when the slot was freed
                let generation = NonZeroU32::new(generation).expect("generation overflow");
                *slot = Slot::Occupied { generation, control: Box::new(control) };
                self.free_head = next_free;
                ControlKey { index, generation }
            },
            None => {
                let index = u32::try_from(self.slots.len()).expect("arena exhausted");
                let generation = NonZeroU32::new(1).unwrap();
                self.slots.push(Slot::Occupied { generation, control: Box::new(control) });
                ControlKey { index, generation }
            },
        }
    }

    /// Frees the slot; the key (and every copy of it) goes stale.
    pub fn remove(&mut self, key: ControlKey) -> Option<Control> {
        let slot = self.slots.get_mut(key.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {
                let next_generation = generation.get().wrapping_add(1);
                let old = std::mem::replace(slot, Slot::Free {
                    generation: next_generation,
                    next_free: self.free_head,
                });
                self.free_head = Some(key.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { control, .. } => Some(*control),
                    Slot::Free { .. } => unreachable!(),
                }
            },
            _ => None,
        }
    }

    pub fn contains(&self, key: ControlKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: ControlKey) -> Option<&Control> {
        match self.slots.get(key.index as usize) {
            Some(Slot::Occupied { generation, control }) if *generation == key.generation => {
                Some(control)
            },
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: ControlKey) -> Option<&mut Control> {
        match self.slots.get_mut(key.index as usize) {
            Some(Slot::Occupied { generation, control }) if *generation == key.generation => {
                Some(control)
            },
            _ => None,
        }
    }

    /// Keys of every live control, in slot order.
    pub fn keys(&self) -> impl Iterator<Item = ControlKey> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { generation, .. } => Some(ControlKey {
                index: index as u32,
                generation: *generation,
            }),
            Slot::Free { .. } => None,
        })
    }
}

impl Index<ControlKey> for Arena {
    type Output = Control;

    fn index(&self, key: ControlKey) -> &Control {
        self.get(key).expect("stale or foreign control key")
    }
}

impl IndexMut<ControlKey> for Arena {
    fn index_mut(&mut self, key: ControlKey) -> &mut Control {
        self.get_mut(key).expect("stale or foreign control key")
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
