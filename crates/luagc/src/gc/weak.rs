// Weak tables
//
// A table with a weak mode is kept gray for the whole cycle and queued on the
// weak list when the propagator first visits it. Its weak side is not marked.
// Entries are cleared only in the atomic phase, once marking has converged.

use std::fmt;

use crate::{GC, GcId, GcObjectKind, GcResult, LuaValue};

/// Which side of a table's entries does not keep objects alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeakMode {
    Keys,
    Values,
    KeysValues,
}

impl WeakMode {
    /// Parse a `__mode` string: any string containing 'k' and/or 'v'
    pub fn from_mode_str(mode: &str) -> Option<Self> {
        match (mode.contains('k'), mode.contains('v')) {
            (true, true) => Some(WeakMode::KeysValues),
            (true, false) => Some(WeakMode::Keys),
            (false, true) => Some(WeakMode::Values),
            (false, false) => None,
        }
    }

    #[inline(always)]
    pub fn weak_keys(self) -> bool {
        matches!(self, WeakMode::Keys | WeakMode::KeysValues)
    }

    #[inline(always)]
    pub fn weak_values(self) -> bool {
        matches!(self, WeakMode::Values | WeakMode::KeysValues)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeakMode::Keys => "k",
            WeakMode::Values => "v",
            WeakMode::KeysValues => "kv",
        }
    }
}

impl fmt::Display for WeakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GC {
    /// Attach (or remove) a weak mode directly, without going through a metatable
    pub fn set_weak_mode(&mut self, table: GcId, mode: Option<WeakMode>) -> GcResult<()> {
        self.table_mut(table)?.weak_mode = mode;
        // a black table must be revisited so the new mode takes effect this cycle
        self.barrier_backward(table);
        Ok(())
    }

    pub fn table_weak_mode(&self, table: GcId) -> Option<WeakMode> {
        self.pool.get(table)?.object.as_table()?.weak_mode
    }

    /// Port of lgc.c iscleared: strings are values and never weak, so they
    /// are marked instead of cleared. Any other white object is cleared.
    pub(crate) fn is_cleared(&mut self, value: LuaValue) -> bool {
        let Some(id) = value.as_gc_id() else {
            return false;
        };
        let Some(slot) = self.pool.get_mut(id) else {
            return true;
        };
        if slot.kind() == GcObjectKind::String {
            slot.header.make_black();
            return false;
        }
        slot.header.is_white()
    }

    /// Remove entries whose weak side is still white. Clearing a key drops
    /// the whole entry; clearing a value leaves the key behind as a dead
    /// entry that the next traversal prunes. Returns the number of entries cleared.
    pub(crate) fn clear_weak_table(&mut self, table: GcId) -> usize {
        let Some(t) = self.pool.get(table).and_then(|s| s.object.as_table()) else {
            return 0;
        };
        let Some(mode) = t.weak_mode else {
            return 0;
        };

        let array: Vec<(usize, LuaValue)> = if mode.weak_values() {
            t.array
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_collectable())
                .map(|(i, v)| (i, *v))
                .collect()
        } else {
            Vec::new()
        };
        let hash: Vec<(LuaValue, LuaValue)> = t
            .hash
            .iter()
            .filter(|(k, v)| !v.is_nil() && (k.is_collectable() || v.is_collectable()))
            .map(|(k, v)| (*k, *v))
            .collect();

        let mut dead_slots = Vec::new();
        for (i, v) in array {
            if self.is_cleared(v) {
                dead_slots.push(i);
            }
        }

        let mut dead_keys = Vec::new();
        let mut dead_values = Vec::new();
        for (k, v) in hash {
            if mode.weak_keys() && self.is_cleared(k) {
                dead_keys.push(k);
            } else if mode.weak_values() && self.is_cleared(v) {
                dead_values.push(k);
            }
        }

        let cleared = dead_slots.len() + dead_keys.len() + dead_values.len();
        if cleared == 0 {
            return 0;
        }

        if let Some(t) = self.pool.get_mut(table).and_then(|s| s.object.as_table_mut()) {
            for i in dead_slots {
                t.array[i] = LuaValue::Nil;
            }
            t.trim_array();
            for k in dead_values {
                if let Some(v) = t.hash.get_mut(&k) {
                    *v = LuaValue::Nil;
                }
            }
            for k in dead_keys {
                t.hash.remove(&k);
            }
        }

        self.stats.weak_entries_cleared += cleared;
        cleared
    }

    /// Clear every weak table queued from `from` onwards
    pub(crate) fn clear_weak_tables(&mut self, from: usize) {
        let tables: Vec<GcId> = self.weak.get(from..).unwrap_or_default().to_vec();
        let mut cleared = 0;
        for table in tables {
            cleared += self.clear_weak_table(table);
        }
        if cleared > 0 {
            log::trace!("cleared {} weak entries", cleared);
        }
    }
}
