//! Generation-checked slot arena backing the node/socket/connection stores
//! of [`crate::graph::BasicNodeGraph`] (spec.md §9, "Graph representation").

use crate::uid::{Descriptor, Handle, Uid};

struct Slot<T> {
    generation: u32,
    uid: Uid,
    data: Option<T>,
}

pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { slots: Vec::new(), free: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Arena { slots: Vec::with_capacity(cap), free: Vec::new() }
    }

    /// Insert `data` under a fresh `uid`, returning the descriptor for it.
    pub(crate) fn insert(&mut self, uid: Uid, data: T) -> Descriptor {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.uid = uid;
            slot.data = Some(data);
            Descriptor { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, uid, data: Some(data) });
            Descriptor { index, generation: 0 }
        }
    }

    /// Remove the entity at `descriptor`, bumping its generation so that any
    /// handle referring to the old occupant becomes invalid.
    pub(crate) fn remove(&mut self, descriptor: Descriptor) -> Option<T> {
        let slot = self.slots.get_mut(descriptor.index as usize)?;
        if slot.generation != descriptor.generation {
            return None;
        }
        let data = slot.data.take();
        if data.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            slot.uid = Uid::nil();
            self.free.push(descriptor.index);
        }
        data
    }

    pub(crate) fn get(&self, descriptor: Descriptor) -> Option<&T> {
        let slot = self.slots.get(descriptor.index as usize)?;
        if slot.generation != descriptor.generation {
            return None;
        }
        slot.data.as_ref()
    }

    pub(crate) fn get_mut(&mut self, descriptor: Descriptor) -> Option<&mut T> {
        let slot = self.slots.get_mut(descriptor.index as usize)?;
        if slot.generation != descriptor.generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// A handle is valid iff the arena still stores the *same* uid for its
    /// descriptor (spec.md §3, "Handle<K>").
    pub(crate) fn contains<K>(&self, handle: Handle<K>) -> bool {
        self.uid_of(handle.descriptor) == Some(handle.uid) && !handle.uid.is_nil()
    }

    pub(crate) fn uid_of(&self, descriptor: Descriptor) -> Option<Uid> {
        let slot = self.slots.get(descriptor.index as usize)?;
        if slot.generation != descriptor.generation || slot.data.is_none() {
            return None;
        }
        Some(slot.uid)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Descriptor, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.data.as_ref().map(|d| (Descriptor { index: i as u32, generation: s.generation }, d))
        })
    }

    pub(crate) fn iter_mut_all(&mut self) -> impl Iterator<Item = (Descriptor, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.data.as_mut().map(|d| (Descriptor { index: i as u32, generation }, d))
        })
    }
}
