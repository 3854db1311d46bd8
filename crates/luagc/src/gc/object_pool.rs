// Object Pool - arena of GC slots addressed by GcId
//
// - Slots are Vec<Option<GcSlot>>; None = free slot
// - Free list gives O(1) allocation after the initial growth
// - The pool does not know about colors or lists; the collector keeps
//   its own bookkeeping lists of ids

use crate::{GcHeader, GcId, GcObject, GcSlot};

pub struct ObjectPool {
    slots: Vec<Option<GcSlot>>,
    free_list: Vec<u32>,
    count: usize,
}

impl ObjectPool {
    pub fn new() -> Self {
        ObjectPool {
            slots: Vec::with_capacity(256),
            free_list: Vec::with_capacity(32),
            count: 0,
        }
    }

    /// Store an object and return its id
    #[inline]
    pub fn alloc(&mut self, header: GcHeader, object: GcObject) -> GcId {
        self.count += 1;
        let slot = GcSlot { header, object };

        if let Some(free_id) = self.free_list.pop() {
            self.slots[free_id as usize] = Some(slot);
            GcId(free_id)
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Some(slot));
            GcId(id)
        }
    }

    #[inline(always)]
    pub fn get(&self, id: GcId) -> Option<&GcSlot> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: GcId) -> Option<&mut GcSlot> {
        self.slots.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    #[inline(always)]
    pub fn header(&self, id: GcId) -> Option<&GcHeader> {
        self.get(id).map(|s| &s.header)
    }

    #[inline(always)]
    pub fn header_mut(&mut self, id: GcId) -> Option<&mut GcHeader> {
        self.get_mut(id).map(|s| &mut s.header)
    }

    /// Release a slot; returns the slot so the caller can account its size
    #[inline]
    pub fn free(&mut self, id: GcId) -> Option<GcSlot> {
        let slot = self.slots.get_mut(id.index())?.take()?;
        self.free_list.push(id.0);
        self.count -= 1;
        Some(slot)
    }

    #[inline(always)]
    pub fn is_valid(&self, id: GcId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live objects
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (GcId, &GcSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|slot| (GcId(i as u32), slot)))
    }

    pub fn shrink_to_fit(&mut self) {
        while let Some(None) = self.slots.last() {
            self.slots.pop();
        }
        let top = self.slots.len() as u32;
        self.free_list.retain(|&id| id < top);
        self.slots.shrink_to_fit();
        self.free_list.shrink_to_fit();
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}
