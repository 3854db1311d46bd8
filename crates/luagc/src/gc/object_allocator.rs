// Object allocation
//
// Every constructor follows the same path:
// 1. pay for the allocation: run a step if the byte counter is over the
//    threshold (luaC_checkGC), and enforce the memory limit
// 2. link the object into its list, colored with the current white
//
// Step 1 may run collection work, so ids the new object will reference are
// anchored as roots for its duration. Stores that grow a table or a stack
// pay for the growth the same way through `pay_growth`.

use std::any::Any;

use crate::lua_value::{LuaClosure, LuaProto, LuaString, LuaTable, LuaThread, LuaUpvalue, LuaUserdata};
use crate::{GC, GcError, GcHeader, GcId, GcObject, GcObjectKind, GcResult, LuaValue};

/// Bytes charged for an object: header plus payload
#[inline]
pub(crate) fn object_size(object: &GcObject) -> usize {
    std::mem::size_of::<GcHeader>() + object.payload_size()
}

impl GC {
    /// Allocate an empty object of `kind`, charged at least `size` bytes.
    /// Strings are always interned, so `String` yields the empty string.
    pub fn new_object(&mut self, kind: GcObjectKind, size: usize) -> GcResult<GcId> {
        if kind == GcObjectKind::String {
            return self.create_string("");
        }
        let object = GcObject::empty(kind);
        let size = size.max(object_size(&object));
        self.prepare_alloc(size)?;
        Ok(self.link_object(object, Some(size)))
    }

    // ==================== String Operations ====================

    /// Create or intern a string
    pub fn create_string(&mut self, s: &str) -> GcResult<GcId> {
        let hash = self.strings.hash_string(s);
        if let Some(id) = self.strings.find(&self.pool, hash, s) {
            // dead but not swept yet: bring it back
            let other_white = GcHeader::otherwhite(self.current_white);
            if let Some(header) = self.pool.header_mut(id)
                && header.is_dead(other_white)
            {
                header.change_white();
            }
            return Ok(id);
        }

        let object = GcObject::String(LuaString::with_hash(s, hash));
        let size = object_size(&object);
        self.prepare_alloc(size)?;
        let id = self.link_object(object, Some(size));
        self.strings.insert(hash, id);
        Ok(id)
    }

    /// Intern without paying for the allocation (heap bootstrap only)
    pub(crate) fn intern_unchecked(&mut self, s: &str) -> GcId {
        let hash = self.strings.hash_string(s);
        if let Some(id) = self.strings.find(&self.pool, hash, s) {
            return id;
        }
        let id = self.link_object(GcObject::String(LuaString::with_hash(s, hash)), None);
        self.strings.insert(hash, id);
        id
    }

    /// Look up an interned string without creating it
    pub fn find_string(&self, s: &str) -> Option<GcId> {
        let hash = self.strings.hash_string(s);
        self.strings.find(&self.pool, hash, s)
    }

    pub fn get_string(&self, id: GcId) -> Option<&str> {
        self.pool
            .get(id)
            .and_then(|slot| slot.object.as_string())
            .map(LuaString::as_str)
    }

    // ==================== Other Objects ====================

    pub fn create_table(&mut self, asize: usize, hsize: usize) -> GcResult<GcId> {
        self.alloc_object(GcObject::Table(LuaTable::new(asize, hsize)), &[])
    }

    /// Closure over an optional prototype (None for native functions)
    pub fn create_closure(&mut self, proto: Option<GcId>, upvalues: Vec<GcId>) -> GcResult<GcId> {
        let mut anchors = upvalues.clone();
        anchors.extend(proto);
        self.alloc_object(
            GcObject::Closure(LuaClosure::new(proto, upvalues)),
            &anchors,
        )
    }

    pub fn create_userdata<T: Any>(&mut self, data: T) -> GcResult<GcId> {
        self.alloc_object(GcObject::UserData(LuaUserdata::new(data)), &[])
    }

    pub fn create_thread(&mut self) -> GcResult<GcId> {
        self.alloc_object(GcObject::Thread(LuaThread::new()), &[])
    }

    pub fn create_proto(&mut self, proto: LuaProto) -> GcResult<GcId> {
        let mut anchors: Vec<GcId> = proto
            .constants
            .iter()
            .filter_map(LuaValue::as_gc_id)
            .collect();
        anchors.extend(proto.child_protos.iter().copied());
        anchors.extend(proto.source_name);
        self.alloc_object(GcObject::Prototype(proto), &anchors)
    }

    /// Closed upvalue cell holding `value`
    pub fn create_upvalue(&mut self, value: LuaValue) -> GcResult<GcId> {
        let anchors: Vec<GcId> = value.as_gc_id().into_iter().collect();
        self.alloc_object(GcObject::UpValue(LuaUpvalue::new(value)), &anchors)
    }

    /// Mark an object as never collected (luaS_fix)
    pub fn fix(&mut self, id: GcId) {
        if let Some(header) = self.pool.header_mut(id) {
            header.set_fixed();
        }
    }

    // ==================== Internals ====================

    fn alloc_object(&mut self, object: GcObject, anchors: &[GcId]) -> GcResult<GcId> {
        let size = object_size(&object);
        let mark = self.anchors.len();
        self.anchors.extend_from_slice(anchors);
        let paid = self.prepare_alloc(size);
        self.anchors.truncate(mark);
        paid?;
        Ok(self.link_object(object, Some(size)))
    }

    /// Pay for an allocation of `size` bytes: collection work first, then the
    /// memory limit, with one emergency full collection before giving up
    pub(crate) fn prepare_alloc(&mut self, size: usize) -> GcResult<()> {
        self.check_gc();
        self.enforce_limit(size, size)
    }

    /// Pay for `grown` bytes an existing object already took on. The object
    /// and the values in `held` stay anchored while collection work runs.
    pub(crate) fn pay_growth(
        &mut self,
        id: GcId,
        grown: usize,
        held: &[LuaValue],
    ) -> GcResult<()> {
        let mark = self.anchors.len();
        self.anchors.push(id);
        self.anchors.extend(held.iter().filter_map(|v| v.as_gc_id()));
        self.check_gc();
        let paid = self.enforce_limit(0, grown);
        self.anchors.truncate(mark);
        paid
    }

    fn enforce_limit(&mut self, pending: usize, requested: usize) -> GcResult<()> {
        let limit = self.option.memory_limit;
        if self.total_bytes.saturating_add(pending) <= limit {
            return Ok(());
        }
        if !self.in_finalizer {
            log::info!(
                "emergency gc: {} bytes in use, {} requested, limit {}",
                self.total_bytes,
                requested,
                limit
            );
            self.stats.emergency_collections += 1;
            self.full_collect();
        }
        if self.total_bytes.saturating_add(pending) <= limit {
            Ok(())
        } else {
            Err(GcError::OutOfMemory { requested, limit })
        }
    }

    /// Link a new object, current white, into its list. No collection work.
    pub(crate) fn link_object(&mut self, object: GcObject, size: Option<usize>) -> GcId {
        let size = size
            .unwrap_or_else(|| object_size(&object))
            .min(u32::MAX as usize);
        let is_string = object.kind() == GcObjectKind::String;
        let header = GcHeader::with_white(self.current_white, size as u32);
        let id = self.pool.alloc(header, object);
        if is_string {
            self.all_strings.push(id);
        } else {
            self.all_objects.push(id);
        }
        self.total_bytes += size;
        self.stats.bytes_allocated += size;
        id
    }

    /// Re-charge an object whose payload grew or shrank; returns the growth
    pub(crate) fn reaccount(&mut self, id: GcId) -> usize {
        let Some(slot) = self.pool.get_mut(id) else {
            return 0;
        };
        let new_size = object_size(&slot.object).min(u32::MAX as usize);
        let old_size = slot.header.size as usize;
        slot.header.size = new_size as u32;
        if new_size > old_size {
            let grown = new_size - old_size;
            self.total_bytes += grown;
            self.stats.bytes_allocated += grown;
            grown
        } else {
            let shrunk = old_size - new_size;
            self.total_bytes = self.total_bytes.saturating_sub(shrunk);
            self.stats.bytes_freed += shrunk;
            0
        }
    }
}
