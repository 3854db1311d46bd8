// LuaTable - array part + hash part
//
// Keys 1..=n live in the array part; everything else lives in an ahash map.
// A hash entry whose value is nil is a dead key left behind by weak-table
// clearing; it is invisible to lookups and iteration and is pruned the next
// time the collector traverses the table.

use crate::{GcError, GcId, GcResult, LuaValue, WeakMode};
use ahash::RandomState;
use std::collections::HashMap;

pub struct LuaTable {
    pub(crate) array: Vec<LuaValue>,
    pub(crate) hash: HashMap<LuaValue, LuaValue, RandomState>,
    pub(crate) metatable: Option<GcId>,
    pub(crate) weak_mode: Option<WeakMode>,
}

impl LuaTable {
    pub fn new(asize: usize, hsize: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(asize),
            hash: HashMap::with_capacity_and_hasher(hsize, RandomState::new()),
            metatable: None,
            weak_mode: None,
        }
    }

    #[inline(always)]
    pub fn get_metatable(&self) -> Option<GcId> {
        self.metatable
    }

    #[inline(always)]
    pub fn weak_mode(&self) -> Option<WeakMode> {
        self.weak_mode
    }

    /// Border of the array part
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.hash.values().all(|v| v.is_nil())
    }

    pub fn raw_get(&self, key: &LuaValue) -> LuaValue {
        if let Some(i) = key.as_array_index()
            && i <= self.array.len()
        {
            return self.array[i - 1];
        }
        self.hash.get(key).copied().unwrap_or(LuaValue::Nil)
    }

    #[inline]
    pub fn get_int(&self, key: i64) -> LuaValue {
        self.raw_get(&LuaValue::Number(key as f64))
    }

    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> GcResult<()> {
        match key {
            LuaValue::Nil => return Err(GcError::InvalidTableKey("nil")),
            LuaValue::Number(n) if n.is_nan() => return Err(GcError::InvalidTableKey("NaN")),
            _ => {}
        }

        if let Some(i) = key.as_array_index() {
            let len = self.array.len();
            if i <= len {
                self.array[i - 1] = value;
                if i == len && value.is_nil() {
                    self.trim_array();
                }
                return Ok(());
            }
            if i == len + 1 && !value.is_nil() {
                self.hash.remove(&key);
                self.array.push(value);
                self.migrate_from_hash();
                return Ok(());
            }
        }

        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
        Ok(())
    }

    #[inline]
    pub fn set_int(&mut self, key: i64, value: LuaValue) -> GcResult<()> {
        self.raw_set(LuaValue::Number(key as f64), value)
    }

    /// All live entries; array part first, then the hash part in map order
    pub fn iter_all(&self) -> Vec<(LuaValue, LuaValue)> {
        let mut entries = Vec::with_capacity(self.array.len() + self.hash.len());
        for (i, v) in self.array.iter().enumerate() {
            if !v.is_nil() {
                entries.push((LuaValue::Number((i + 1) as f64), *v));
            }
        }
        for (k, v) in &self.hash {
            if !v.is_nil() {
                entries.push((*k, *v));
            }
        }
        entries
    }

    /// Number of live entries in both parts
    pub fn entry_count(&self) -> usize {
        self.array.iter().filter(|v| !v.is_nil()).count()
            + self.hash.values().filter(|v| !v.is_nil()).count()
    }

    /// Bytes charged to the collector for this table
    pub fn byte_size(&self) -> usize {
        std::mem::size_of::<LuaTable>()
            + self.array.capacity() * std::mem::size_of::<LuaValue>()
            + self.hash.capacity() * std::mem::size_of::<(LuaValue, LuaValue)>()
    }

    /// Drop dead keys left by weak clearing
    pub(crate) fn prune_dead_keys(&mut self) {
        if self.hash.values().any(|v| v.is_nil()) {
            self.hash.retain(|_, v| !v.is_nil());
        }
    }

    /// Pull n+1, n+2, ... out of the hash part after the array grew
    fn migrate_from_hash(&mut self) {
        if self.hash.is_empty() {
            return;
        }
        loop {
            let next = LuaValue::Number((self.array.len() + 1) as f64);
            match self.hash.remove(&next) {
                Some(v) if !v.is_nil() => self.array.push(v),
                _ => break,
            }
        }
    }

    /// Give back capacity above the given sizes
    pub(crate) fn shrink_to(&mut self, array_capacity: usize, hash_capacity: usize) {
        self.array.shrink_to(array_capacity);
        self.hash.shrink_to(hash_capacity);
    }

    pub(crate) fn trim_array(&mut self) {
        while let Some(last) = self.array.last() {
            if last.is_nil() {
                self.array.pop();
            } else {
                break;
            }
        }
    }
}

impl Default for LuaTable {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
