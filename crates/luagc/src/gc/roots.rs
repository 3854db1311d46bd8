// Root set
//
// The collector's own mutator state (main thread, registry, per-kind
// metatables, pinned objects) plus any number of host-provided enumerators.
// Roots are marked when a cycle starts and again in the atomic phase, so
// roots added mid-cycle are still seen.

use crate::{GC, GcId, GcObjectKind};

/// Yields every object directly reachable from mutator-owned state.
/// Missing a root frees a live object; extra roots only cost marking time.
pub trait RootEnumerator {
    fn for_each_root(&self, visit: &mut dyn FnMut(GcId));
}

impl RootEnumerator for GC {
    fn for_each_root(&self, visit: &mut dyn FnMut(GcId)) {
        visit(self.main_thread);
        visit(self.registry);
        for mt in self.type_metatables.iter().flatten() {
            visit(*mt);
        }
        for id in self.pinned.keys() {
            visit(*id);
        }
        for id in &self.anchors {
            visit(*id);
        }
        for source in &self.root_sources {
            source.for_each_root(visit);
        }
    }
}

impl GC {
    /// Mark the root set, plus objects still waiting for their finalizer
    pub(crate) fn mark_roots(&mut self) {
        let mut roots = Vec::new();
        self.for_each_root(&mut |id| roots.push(id));
        for id in roots {
            self.mark_object(id);
        }
        self.mark_being_finalized();
    }

    /// The main thread; its stack is a root
    pub fn main_thread(&self) -> GcId {
        self.main_thread
    }

    /// Registry table, which also holds the globals
    pub fn registry(&self) -> GcId {
        self.registry
    }

    /// Keep an object alive until a matching `unpin`. Pins are counted.
    pub fn pin(&mut self, id: GcId) {
        *self.pinned.entry(id).or_insert(0) += 1;
    }

    /// Drop one pin; returns false if the object was not pinned
    pub fn unpin(&mut self, id: GcId) -> bool {
        let Some(count) = self.pinned.get_mut(&id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.pinned.remove(&id);
        }
        true
    }

    pub fn is_pinned(&self, id: GcId) -> bool {
        self.pinned.contains_key(&id)
    }

    /// Register an extra root source owned by the host
    pub fn add_root_source(&mut self, source: Box<dyn RootEnumerator>) {
        self.root_sources.push(source);
    }

    /// Default metatable shared by every object of a kind
    pub fn set_type_metatable(&mut self, kind: GcObjectKind, mt: Option<GcId>) {
        self.type_metatables[kind as usize] = mt;
    }

    pub fn get_type_metatable(&self, kind: GcObjectKind) -> Option<GcId> {
        self.type_metatables[kind as usize]
    }
}
