use ahash::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

use crate::GcId;
use crate::gc::object_pool::ObjectPool;

/// String interner
/// - Same content always maps to the same GcId while the string lives
/// - Content hash -> ids, collisions resolved by comparing content
/// - Dead strings are dropped by the sweeper through `remove`
pub struct StringInterner {
    map: HashMap<u64, Vec<GcId>, RandomState>,
    hashbuilder: RandomState,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(256, RandomState::new()),
            hashbuilder: RandomState::new(),
        }
    }

    #[inline(always)]
    pub fn hash_string(&self, s: &str) -> u64 {
        let mut hasher = self.hashbuilder.build_hasher();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up an interned string by content
    pub fn find(&self, pool: &ObjectPool, hash: u64, s: &str) -> Option<GcId> {
        let ids = self.map.get(&hash)?;
        ids.iter().copied().find(|&id| {
            pool.get(id)
                .and_then(|slot| slot.object.as_string())
                .is_some_and(|ls| ls.len() == s.len() && ls.as_str() == s)
        })
    }

    pub fn insert(&mut self, hash: u64, id: GcId) {
        self.map.entry(hash).or_default().push(id);
    }

    pub fn remove(&mut self, hash: u64, id: GcId) {
        if let Some(ids) = self.map.get_mut(&hash) {
            ids.retain(|&i| i != id);
            if ids.is_empty() {
                self.map.remove(&hash);
            }
        }
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
