// Mutator helpers
//
// Stores into heap objects with the matching write barrier applied:
// - tables (entries and metatable): backward barrier
// - upvalue cells, closure env, userdata metatable/env: forward barrier
// - thread stacks: none, threads are re-traversed in the atomic phase

use std::any::Any;

use crate::{
    GC, GcError, GcId, GcObject, GcObjectKind, GcResult, LuaTable, LuaThread, LuaValue, WeakMode,
};

impl GC {
    fn expect_kind(&self, id: GcId, expected: GcObjectKind) -> GcResult<()> {
        let found = self.kind(id).ok_or(GcError::InvalidObject(id))?;
        if found == expected {
            Ok(())
        } else {
            Err(GcError::TypeMismatch { expected, found })
        }
    }

    fn mismatch(&self, id: GcId, expected: GcObjectKind) -> GcError {
        match self.kind(id) {
            Some(found) => GcError::TypeMismatch { expected, found },
            None => GcError::InvalidObject(id),
        }
    }

    pub(crate) fn table_ref(&self, id: GcId) -> GcResult<&LuaTable> {
        self.pool
            .get(id)
            .and_then(|s| s.object.as_table())
            .ok_or_else(|| self.mismatch(id, GcObjectKind::Table))
    }

    pub(crate) fn table_mut(&mut self, id: GcId) -> GcResult<&mut LuaTable> {
        self.expect_kind(id, GcObjectKind::Table)?;
        self.pool
            .get_mut(id)
            .and_then(|s| s.object.as_table_mut())
            .ok_or(GcError::InvalidObject(id))
    }

    fn thread_mut(&mut self, id: GcId) -> GcResult<&mut LuaThread> {
        self.expect_kind(id, GcObjectKind::Thread)?;
        self.pool
            .get_mut(id)
            .and_then(|s| s.object.as_thread_mut())
            .ok_or(GcError::InvalidObject(id))
    }

    // ============ Tables ============

    pub fn table_get(&self, table: GcId, key: LuaValue) -> GcResult<LuaValue> {
        Ok(self.table_ref(table)?.raw_get(&key))
    }

    /// Raw store with backward barrier. Growth is paid for like an
    /// allocation; if the memory limit refuses it the store is undone.
    pub fn table_set(&mut self, table: GcId, key: LuaValue, value: LuaValue) -> GcResult<()> {
        let t = self.table_mut(table)?;
        let old = t.raw_get(&key);
        let capacity = (t.array.capacity(), t.hash.capacity());
        t.raw_set(key, value)?;

        self.barrier_back_value(table, key);
        self.barrier_back_value(table, value);
        let grown = self.reaccount(table);
        if grown == 0 {
            return Ok(());
        }
        if let Err(e) = self.pay_growth(table, grown, &[key, value]) {
            let t = self.table_mut(table)?;
            t.raw_set(key, old)?;
            t.shrink_to(capacity.0, capacity.1);
            self.reaccount(table);
            return Err(e);
        }
        Ok(())
    }

    /// Border of the array part
    pub fn table_len(&self, table: GcId) -> GcResult<usize> {
        Ok(self.table_ref(table)?.len())
    }

    /// Live entries of a table, array part first
    pub fn table_entries(&self, table: GcId) -> GcResult<Vec<(LuaValue, LuaValue)>> {
        Ok(self.table_ref(table)?.iter_all())
    }

    // ============ Metatables ============

    /// Set the metatable of a table or userdata; for any other kind this sets
    /// the metatable shared by the whole kind. A table's weak mode is read
    /// from the metatable's "__mode" field here.
    pub fn set_metatable(&mut self, obj: GcId, mt: Option<GcId>) -> GcResult<()> {
        if let Some(mt) = mt {
            self.expect_kind(mt, GcObjectKind::Table)?;
        }
        let kind = self.kind(obj).ok_or(GcError::InvalidObject(obj))?;
        match kind {
            GcObjectKind::Table => {
                let mode = match mt {
                    Some(mt) => self.weak_mode_of(mt)?,
                    None => None,
                };
                let t = self.table_mut(obj)?;
                t.metatable = mt;
                t.weak_mode = mode;
                self.barrier_backward(obj);
                Ok(())
            }
            GcObjectKind::UserData => self.set_userdata_metatable(obj, mt),
            _ => {
                self.set_type_metatable(kind, mt);
                Ok(())
            }
        }
    }

    pub fn get_metatable(&self, obj: GcId) -> Option<GcId> {
        let slot = self.pool.get(obj)?;
        match &slot.object {
            GcObject::Table(t) => t.metatable,
            GcObject::UserData(u) => u.metatable,
            _ => self.get_type_metatable(slot.kind()),
        }
    }

    fn weak_mode_of(&self, mt: GcId) -> GcResult<Option<WeakMode>> {
        let mode = self
            .table_ref(mt)?
            .raw_get(&LuaValue::Object(self.tm_mode));
        Ok(mode
            .as_gc_id()
            .and_then(|id| self.get_string(id))
            .and_then(WeakMode::from_mode_str))
    }

    // ============ Upvalues & Closures ============

    pub fn set_upvalue(&mut self, upvalue: GcId, value: LuaValue) -> GcResult<()> {
        match self.pool.get_mut(upvalue).map(|s| &mut s.object) {
            Some(GcObject::UpValue(uv)) => uv.value = value,
            _ => return Err(self.mismatch(upvalue, GcObjectKind::UpValue)),
        }
        self.barrier_forward_value(upvalue, value);
        Ok(())
    }

    pub fn get_upvalue(&self, upvalue: GcId) -> GcResult<LuaValue> {
        self.pool
            .get(upvalue)
            .and_then(|s| s.object.as_upvalue())
            .map(|uv| uv.get())
            .ok_or_else(|| self.mismatch(upvalue, GcObjectKind::UpValue))
    }

    pub fn set_closure_env(&mut self, closure: GcId, env: Option<GcId>) -> GcResult<()> {
        if let Some(env) = env {
            self.expect_kind(env, GcObjectKind::Table)?;
        }
        match self.pool.get_mut(closure).map(|s| &mut s.object) {
            Some(GcObject::Closure(c)) => c.env = env,
            _ => return Err(self.mismatch(closure, GcObjectKind::Closure)),
        }
        if let Some(env) = env {
            self.barrier_forward(closure, env);
        }
        Ok(())
    }

    // ============ Userdata ============

    pub fn set_userdata_metatable(&mut self, userdata: GcId, mt: Option<GcId>) -> GcResult<()> {
        match self.pool.get_mut(userdata).map(|s| &mut s.object) {
            Some(GcObject::UserData(u)) => u.metatable = mt,
            _ => return Err(self.mismatch(userdata, GcObjectKind::UserData)),
        }
        if let Some(mt) = mt {
            self.barrier_forward(userdata, mt);
        }
        Ok(())
    }

    pub fn set_userdata_env(&mut self, userdata: GcId, env: Option<GcId>) -> GcResult<()> {
        match self.pool.get_mut(userdata).map(|s| &mut s.object) {
            Some(GcObject::UserData(u)) => u.env = env,
            _ => return Err(self.mismatch(userdata, GcObjectKind::UserData)),
        }
        if let Some(env) = env {
            self.barrier_forward(userdata, env);
        }
        Ok(())
    }

    pub fn userdata_ref<T: Any>(&self, userdata: GcId) -> Option<&T> {
        self.pool.get(userdata)?.object.as_userdata()?.downcast_ref()
    }

    pub fn userdata_mut<T: Any>(&mut self, userdata: GcId) -> Option<&mut T> {
        self.pool
            .get_mut(userdata)?
            .object
            .as_userdata_mut()?
            .downcast_mut()
    }

    // ============ Threads ============

    pub fn thread_push(&mut self, thread: GcId, value: LuaValue) -> GcResult<()> {
        let th = self.thread_mut(thread)?;
        let top = th.stack_top();
        th.push(value);
        self.pay_stack_growth(thread, top, None, value)
    }

    pub fn thread_pop(&mut self, thread: GcId) -> GcResult<Option<LuaValue>> {
        Ok(self.thread_mut(thread)?.pop())
    }

    pub fn thread_get(&self, thread: GcId, index: usize) -> GcResult<Option<LuaValue>> {
        self.pool
            .get(thread)
            .and_then(|s| s.object.as_thread())
            .map(|th| th.get(index))
            .ok_or_else(|| self.mismatch(thread, GcObjectKind::Thread))
    }

    pub fn thread_set(&mut self, thread: GcId, index: usize, value: LuaValue) -> GcResult<()> {
        let th = self.thread_mut(thread)?;
        let top = th.stack_top();
        let old = th.get(index);
        th.set(index, value);
        self.pay_stack_growth(thread, top, old.map(|v| (index, v)), value)
    }

    /// Charge a grown stack; a refused growth restores `top` and the
    /// overwritten slot
    fn pay_stack_growth(
        &mut self,
        thread: GcId,
        top: usize,
        overwritten: Option<(usize, LuaValue)>,
        value: LuaValue,
    ) -> GcResult<()> {
        let grown = self.reaccount(thread);
        if grown == 0 {
            return Ok(());
        }
        if let Err(e) = self.pay_growth(thread, grown, &[value]) {
            let th = self.thread_mut(thread)?;
            th.truncate(top);
            if let Some((index, old)) = overwritten {
                th.set(index, old);
            }
            th.stack.shrink_to(top);
            self.reaccount(thread);
            return Err(e);
        }
        Ok(())
    }

    /// Drop stack slots above `top`
    pub fn thread_truncate(&mut self, thread: GcId, top: usize) -> GcResult<()> {
        self.thread_mut(thread)?.truncate(top);
        Ok(())
    }

    /// Push onto the main thread stack
    pub fn push(&mut self, value: LuaValue) -> GcResult<()> {
        self.thread_push(self.main_thread, value)
    }

    pub fn pop(&mut self) -> GcResult<Option<LuaValue>> {
        self.thread_pop(self.main_thread)
    }

    // ============ Globals ============

    pub fn set_global(&mut self, name: &str, value: LuaValue) -> GcResult<()> {
        let mark = self.anchors.len();
        self.anchors.extend(value.as_gc_id());
        let key = self.create_string(name);
        self.anchors.truncate(mark);
        let key = key?;
        self.table_set(self.registry, LuaValue::Object(key), value)
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        let Some(key) = self.find_string(name) else {
            return LuaValue::Nil;
        };
        self.table_get(self.registry, LuaValue::Object(key))
            .unwrap_or_default()
    }

    // ============ Display ============

    /// Render a value the way `tostring` does
    pub fn tostring(&self, value: LuaValue) -> String {
        match value {
            LuaValue::Nil => "nil".to_string(),
            LuaValue::Boolean(b) => b.to_string(),
            LuaValue::Number(n) => {
                if n.is_nan() {
                    "nan".to_string()
                } else if n.is_infinite() {
                    (if n > 0.0 { "inf" } else { "-inf" }).to_string()
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    let mut buf = itoa::Buffer::new();
                    buf.format(n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            LuaValue::Object(id) => match self.pool.get(id) {
                Some(slot) => match &slot.object {
                    GcObject::String(s) => s.as_str().to_string(),
                    _ => format!("{}: {}", slot.kind(), id),
                },
                None => format!("dead object {}", id),
            },
        }
    }
}
