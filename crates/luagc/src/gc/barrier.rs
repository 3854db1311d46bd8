// ============ GC Write Barriers (from lgc.c) ============
//
// Every store of a collectable reference into a heap object goes through one
// of these. Tables use the backward barrier (one demotion covers any number
// of further stores); closures, upvalue cells and userdata use the forward one.

use crate::{GC, GcId, GcState, LuaValue};

impl GC {
    /// Forward barrier (luaC_barrierf)
    /// Called when `container` is modified to point to `value`. If a black
    /// container gets a white value, either mark the value (while marking)
    /// or whiten the container (after marking) so the next cycle sees it.
    #[inline]
    pub fn barrier_forward(&mut self, container: GcId, value: GcId) {
        let (Some(o), Some(v)) = (self.pool.header(container), self.pool.header(value)) else {
            return;
        };
        if !(o.is_black() && v.is_white()) {
            return;
        }
        self.barrier_forward_slow(container, value);
    }

    #[cold]
    fn barrier_forward_slow(&mut self, container: GcId, value: GcId) {
        if self.gc_state.keep_invariant() {
            self.mark_object(value);
        } else {
            let current_white = self.current_white;
            if let Some(header) = self.pool.header_mut(container) {
                header.make_white(current_white);
            }
        }
    }

    /// Forward barrier for a stored value; non-collectable values need nothing
    #[inline]
    pub fn barrier_forward_value(&mut self, container: GcId, value: LuaValue) {
        if let LuaValue::Object(id) = value {
            self.barrier_forward(container, id);
        }
    }

    /// Backward barrier (luaC_barrierback)
    /// Instead of marking the stored value, turn a black container gray again
    /// and queue it for re-traversal in the atomic phase.
    #[inline]
    pub fn barrier_backward(&mut self, container: GcId) {
        match self.pool.header(container) {
            Some(o) if o.is_black() => {}
            _ => return,
        }
        if matches!(self.gc_state, GcState::Pause | GcState::Finalize) {
            return;
        }
        if let Some(header) = self.pool.header_mut(container) {
            header.make_gray();
        }
        self.grayagain.push(container);
    }

    /// Backward barrier for a stored value (luaC_barriert): only a white
    /// value can break the invariant
    #[inline]
    pub fn barrier_back_value(&mut self, container: GcId, value: LuaValue) {
        if let LuaValue::Object(id) = value
            && self.pool.header(id).is_some_and(|h| h.is_white())
        {
            self.barrier_backward(container);
        }
    }
}
