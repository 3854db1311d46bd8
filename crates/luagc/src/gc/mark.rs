// Tri-color propagation
//
// mark_object turns a white object gray and queues it (strings have nothing
// to visit and go straight to black). propagate_mark pops one gray object,
// marks everything it references and blackens it, with two exceptions:
// - weak tables stay gray and are queued on the weak list
// - threads stay gray during Propagate and are queued on the gray-again
//   list, since stack writes are not barriered

use crate::{GC, GcError, GcId, GcObject, GcObjectKind, GcResult, GcState, LuaValue};

impl GC {
    /// Mark an object (reallymarkobject)
    #[inline]
    pub(crate) fn mark_object(&mut self, id: GcId) {
        let Some(slot) = self.pool.get_mut(id) else {
            return;
        };
        if !slot.header.is_white() {
            return;
        }
        if slot.kind() == GcObjectKind::String {
            slot.header.make_black();
        } else {
            slot.header.make_gray();
            self.gray.push(id);
        }
    }

    #[inline]
    pub(crate) fn mark_value(&mut self, value: LuaValue) {
        if let LuaValue::Object(id) = value {
            self.mark_object(id);
        }
    }

    /// Traverse one gray object. Returns the work done: one unit for the
    /// object plus one per reference visited.
    pub(crate) fn propagate_mark(&mut self) -> isize {
        let Some(id) = self.gray.pop() else {
            return 0;
        };
        let state = self.gc_state;
        let Some(slot) = self.pool.get_mut(id) else {
            return 1;
        };
        if slot.header.is_black() {
            return 1;
        }

        if let GcObject::Table(t) = &mut slot.object {
            t.prune_dead_keys();
        }

        let mut refs = std::mem::take(&mut self.trace_buf);
        refs.clear();
        trace_refs(&slot.object, &mut refs);

        let requeue = match &slot.object {
            GcObject::Table(t) if t.weak_mode.is_some() => Some(Requeue::Weak),
            GcObject::Thread(_) if state == GcState::Propagate => Some(Requeue::GrayAgain),
            _ => None,
        };
        match requeue {
            Some(_) => slot.header.make_gray(),
            None => slot.header.make_black(),
        }
        match requeue {
            Some(Requeue::Weak) => self.weak.push(id),
            Some(Requeue::GrayAgain) => self.grayagain.push(id),
            None => {}
        }

        let work = 1 + refs.len() as isize;
        for &r in &refs {
            self.mark_object(r);
        }
        self.trace_buf = refs;
        work
    }

    /// Empty the gray list
    pub(crate) fn propagate_all(&mut self) -> isize {
        let mut work = 0;
        while !self.gray.is_empty() {
            work += self.propagate_mark();
        }
        work
    }

    /// Check the tri-color invariant: while marking, no black object may
    /// reference a white one. Outside Propagate/Atomic there is nothing to check.
    pub fn check_invariant(&self) -> GcResult<()> {
        if !self.gc_state.keep_invariant() {
            return Ok(());
        }
        let mut refs = Vec::new();
        for (holder, slot) in self.pool.iter() {
            if !slot.header.is_black() {
                continue;
            }
            refs.clear();
            trace_refs(&slot.object, &mut refs);
            for &target in &refs {
                if let Some(h) = self.pool.header(target)
                    && h.is_white()
                    && !h.is_fixed()
                {
                    return Err(GcError::InvariantViolation { holder, target });
                }
            }
        }
        Ok(())
    }
}

enum Requeue {
    Weak,
    GrayAgain,
}

/// Strong outgoing references of one object. For weak tables only the
/// strong side is reported; dead entries (nil values) are skipped.
pub(crate) fn trace_refs(object: &GcObject, out: &mut Vec<GcId>) {
    match object {
        GcObject::String(_) => {}
        GcObject::Table(t) => {
            let (weak_keys, weak_values) = t
                .weak_mode
                .map_or((false, false), |m| (m.weak_keys(), m.weak_values()));
            out.extend(t.metatable);
            if !weak_values {
                out.extend(t.array.iter().filter_map(LuaValue::as_gc_id));
            }
            for (k, v) in &t.hash {
                if v.is_nil() {
                    continue;
                }
                if !weak_keys {
                    out.extend(k.as_gc_id());
                }
                if !weak_values {
                    out.extend(v.as_gc_id());
                }
            }
        }
        GcObject::Closure(c) => {
            out.extend(c.proto);
            out.extend(c.upvalues.iter().copied());
            out.extend(c.env);
        }
        GcObject::UserData(u) => {
            out.extend(u.metatable);
            out.extend(u.env);
        }
        GcObject::Thread(th) => {
            out.extend(th.stack.iter().filter_map(LuaValue::as_gc_id));
        }
        GcObject::Prototype(p) => {
            out.extend(p.constants.iter().filter_map(LuaValue::as_gc_id));
            out.extend(p.child_protos.iter().copied());
            out.extend(p.source_name);
        }
        GcObject::UpValue(uv) => {
            out.extend(uv.value.as_gc_id());
        }
    }
}
