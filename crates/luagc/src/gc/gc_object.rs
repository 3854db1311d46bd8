// ============ GC Objects ============

use crate::{
    GcHeader, GcObjectKind, LuaClosure, LuaProto, LuaString, LuaTable, LuaThread, LuaUpvalue,
    LuaUserdata,
};

/// Owned payload of one heap object. The set of kinds is closed, so the
/// collector traces by matching on this enum.
pub enum GcObject {
    String(LuaString),
    Table(LuaTable),
    Closure(LuaClosure),
    UserData(LuaUserdata),
    Thread(LuaThread),
    Prototype(LuaProto),
    UpValue(LuaUpvalue),
}

impl GcObject {
    /// Fresh, empty object of the given kind
    pub fn empty(kind: GcObjectKind) -> Self {
        match kind {
            GcObjectKind::String => GcObject::String(LuaString::with_hash("", 0)),
            GcObjectKind::Table => GcObject::Table(LuaTable::default()),
            GcObjectKind::Closure => GcObject::Closure(LuaClosure::default()),
            GcObjectKind::UserData => GcObject::UserData(LuaUserdata::new(())),
            GcObjectKind::Thread => GcObject::Thread(LuaThread::new()),
            GcObjectKind::Prototype => GcObject::Prototype(LuaProto::default()),
            GcObjectKind::UpValue => GcObject::UpValue(LuaUpvalue::default()),
        }
    }

    #[inline]
    pub fn kind(&self) -> GcObjectKind {
        match self {
            GcObject::String(_) => GcObjectKind::String,
            GcObject::Table(_) => GcObjectKind::Table,
            GcObject::Closure(_) => GcObjectKind::Closure,
            GcObject::UserData(_) => GcObjectKind::UserData,
            GcObject::Thread(_) => GcObjectKind::Thread,
            GcObject::Prototype(_) => GcObjectKind::Prototype,
            GcObject::UpValue(_) => GcObjectKind::UpValue,
        }
    }

    /// Bytes charged for the payload, excluding the slot itself
    pub fn payload_size(&self) -> usize {
        use std::mem::size_of;
        match self {
            GcObject::String(s) => size_of::<LuaString>() + s.len(),
            GcObject::Table(t) => t.byte_size(),
            GcObject::Closure(c) => {
                size_of::<LuaClosure>() + c.upvalues.capacity() * size_of::<crate::GcId>()
            }
            GcObject::UserData(_) => size_of::<LuaUserdata>(),
            GcObject::Thread(th) => {
                size_of::<LuaThread>() + th.stack.capacity() * size_of::<crate::LuaValue>()
            }
            GcObject::Prototype(p) => {
                size_of::<LuaProto>()
                    + p.constants.capacity() * size_of::<crate::LuaValue>()
                    + p.child_protos.capacity() * size_of::<crate::GcId>()
            }
            GcObject::UpValue(_) => size_of::<LuaUpvalue>(),
        }
    }

    pub fn as_string(&self) -> Option<&LuaString> {
        match self {
            GcObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&LuaTable> {
        match self {
            GcObject::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut LuaTable> {
        match self {
            GcObject::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&LuaClosure> {
        match self {
            GcObject::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_userdata(&self) -> Option<&LuaUserdata> {
        match self {
            GcObject::UserData(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_userdata_mut(&mut self) -> Option<&mut LuaUserdata> {
        match self {
            GcObject::UserData(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&LuaThread> {
        match self {
            GcObject::Thread(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_thread_mut(&mut self) -> Option<&mut LuaThread> {
        match self {
            GcObject::Thread(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_proto(&self) -> Option<&LuaProto> {
        match self {
            GcObject::Prototype(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_upvalue(&self) -> Option<&LuaUpvalue> {
        match self {
            GcObject::UpValue(u) => Some(u),
            _ => None,
        }
    }
}

/// One arena slot: header plus owned payload
pub struct GcSlot {
    pub header: GcHeader,
    pub object: GcObject,
}

impl GcSlot {
    #[inline(always)]
    pub fn kind(&self) -> GcObjectKind {
        self.object.kind()
    }
}
