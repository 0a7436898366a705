//! Generational slot arena for tree nodes.
//!
//! Handles stay valid until their node is released; a released slot is
//! reused with a bumped generation, so stale handles never alias a new node.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Stable handle to a node in a [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable table of values addressed by [`NodeHandle`].
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    /// Store `value` and return its handle.
    pub fn alloc(&mut self, value: T) -> NodeHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    /// Remove and return the value behind `handle`.
    pub fn release(&mut self, handle: NodeHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Shared access.
    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    /// Exclusive access.
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every value. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }
}

impl<T> Index<NodeHandle> for Arena<T> {
    type Output = T;

    /// Panics on a stale handle.
    fn index(&self, handle: NodeHandle) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale node handle {handle:?}"),
        }
    }
}

impl<T> IndexMut<NodeHandle> for Arena<T> {
    fn index_mut(&mut self, handle: NodeHandle) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale node handle {handle:?}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
