// ============ Object IDs ============
// A GcId is a plain u32 slot index into the ObjectPool arena.
// Slots are reused after an object is freed, so an id is only meaningful
// while the object it names is reachable.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct GcId(pub u32);

impl GcId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for GcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcId({})", self.0)
    }
}

impl fmt::Display for GcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Object kind tag. The set is closed: tracing and finalization dispatch on
/// it with an exhaustive match.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcObjectKind {
    String = 0,
    Table = 1,
    Closure = 2,
    UserData = 3,
    Thread = 4,
    Prototype = 5,
    UpValue = 6,
}

impl GcObjectKind {
    pub const COUNT: usize = 7;

    pub fn name(self) -> &'static str {
        match self {
            GcObjectKind::String => "string",
            GcObjectKind::Table => "table",
            GcObjectKind::Closure => "function",
            GcObjectKind::UserData => "userdata",
            GcObjectKind::Thread => "thread",
            GcObjectKind::Prototype => "proto",
            GcObjectKind::UpValue => "upvalue",
        }
    }

    /// Only tables and full userdata may carry a finalizer
    #[inline]
    pub fn supports_finalizer(self) -> bool {
        matches!(self, GcObjectKind::Table | GcObjectKind::UserData)
    }
}

impl fmt::Display for GcObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
