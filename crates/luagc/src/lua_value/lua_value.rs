// LuaValue - tagged dynamic value
//
// Collectable values carry only the arena id of their object; the kind of
// the object lives in the pool, so tracing never needs the value tag.

use crate::GcId;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    Object(GcId),
}

impl LuaValue {
    #[inline(always)]
    pub const fn nil() -> Self {
        LuaValue::Nil
    }

    #[inline(always)]
    pub const fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    #[inline(always)]
    pub const fn number(n: f64) -> Self {
        LuaValue::Number(n)
    }

    #[inline(always)]
    pub const fn object(id: GcId) -> Self {
        LuaValue::Object(id)
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    #[inline(always)]
    pub fn is_collectable(&self) -> bool {
        matches!(self, LuaValue::Object(_))
    }

    #[inline(always)]
    pub fn as_gc_id(&self) -> Option<GcId> {
        match self {
            LuaValue::Object(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            LuaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Array index for a number that is an integer in `1..=u32::MAX`
    #[inline]
    pub fn as_array_index(&self) -> Option<usize> {
        match self {
            LuaValue::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= u32::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Lua truthiness: only nil and false are falsy
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    /// Canonical bits for hashing/equality: -0.0 and 0.0 are the same key
    #[inline(always)]
    fn number_bits(n: f64) -> u64 {
        if n == 0.0 { 0 } else { n.to_bits() }
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Number(a), LuaValue::Number(b)) => {
                LuaValue::number_bits(*a) == LuaValue::number_bits(*b)
            }
            (LuaValue::Object(a), LuaValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

// NaN is rejected as a table key before it can reach a hash map, so bitwise
// number equality is reflexive for every stored key.
impl Eq for LuaValue {}

impl Hash for LuaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LuaValue::Nil => 0u8.hash(state),
            LuaValue::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            LuaValue::Number(n) => {
                2u8.hash(state);
                LuaValue::number_bits(*n).hash(state);
            }
            LuaValue::Object(id) => {
                3u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<f64> for LuaValue {
    fn from(n: f64) -> Self {
        LuaValue::Number(n)
    }
}

impl From<i64> for LuaValue {
    fn from(n: i64) -> Self {
        LuaValue::Number(n as f64)
    }
}

impl From<GcId> for LuaValue {
    fn from(id: GcId) -> Self {
        LuaValue::Object(id)
    }
}

impl From<Option<GcId>> for LuaValue {
    fn from(id: Option<GcId>) -> Self {
        id.map_or(LuaValue::Nil, LuaValue::Object)
    }
}
