// Heap object payloads for the collector
// Every collectable object is referenced by GcId, never by pointer
mod lua_table;
mod lua_thread;
mod lua_value;

use crate::GcId;
use smol_str::SmolStr;
use std::any::Any;
use std::fmt;
use std::hash::Hasher;

pub use lua_table::LuaTable;
pub use lua_thread::*;
pub use lua_value::LuaValue;

/// Lua string (immutable, interned with cached hash)
#[derive(Debug, Clone)]
pub struct LuaString {
    hash: u64, // Keep hash first for alignment
    data: SmolStr,
}

impl LuaString {
    /// Create LuaString with pre-computed hash (avoids double hashing)
    #[inline]
    pub fn with_hash(s: &str, hash: u64) -> Self {
        LuaString {
            data: SmolStr::new(s),
            hash,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: compare hashes first
        if self.hash != other.hash {
            return false;
        }
        self.data == other.data
    }
}

impl Eq for LuaString {}

impl std::hash::Hash for LuaString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Closed upvalue cell: one captured variable shared between closures.
/// Stores into it go through the forward barrier.
#[derive(Debug, Clone, Default)]
pub struct LuaUpvalue {
    pub(crate) value: LuaValue,
}

impl LuaUpvalue {
    pub fn new(value: LuaValue) -> Self {
        LuaUpvalue { value }
    }

    #[inline(always)]
    pub fn get(&self) -> LuaValue {
        self.value
    }
}

/// Userdata - arbitrary Rust data with optional metatable and environment
pub struct LuaUserdata {
    data: Box<dyn Any>,
    pub(crate) metatable: Option<GcId>,
    pub(crate) env: Option<GcId>,
}

impl LuaUserdata {
    pub fn new<T: Any>(data: T) -> Self {
        LuaUserdata {
            data: Box::new(data),
            metatable: None,
            env: None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }

    pub fn get_metatable(&self) -> Option<GcId> {
        self.metatable
    }

    pub fn get_env(&self) -> Option<GcId> {
        self.env
    }
}

impl fmt::Debug for LuaUserdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Userdata({:p})", self.data.as_ref())
    }
}

/// Function prototype: constants and nested prototypes
#[derive(Debug, Clone, Default)]
pub struct LuaProto {
    pub constants: Vec<LuaValue>,
    pub child_protos: Vec<GcId>,
    pub source_name: Option<GcId>,
}

/// Closure: a prototype (None for native functions) plus its upvalue cells
#[derive(Debug, Clone, Default)]
pub struct LuaClosure {
    pub(crate) proto: Option<GcId>,
    pub(crate) upvalues: Vec<GcId>,
    pub(crate) env: Option<GcId>,
}

impl LuaClosure {
    pub fn new(proto: Option<GcId>, upvalues: Vec<GcId>) -> Self {
        LuaClosure {
            proto,
            upvalues,
            env: None,
        }
    }

    pub fn proto(&self) -> Option<GcId> {
        self.proto
    }

    pub fn upvalues(&self) -> &[GcId] {
        &self.upvalues
    }

    pub fn env(&self) -> Option<GcId> {
        self.env
    }
}
