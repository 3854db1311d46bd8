// Lua-style garbage collector
// An incremental tri-color mark & sweep heap with write barriers, weak tables
// and finalizers. Objects live in an arena and are referenced by GcId.

#[cfg(test)]
mod test;

pub mod gc;
pub mod lua_value;

pub use gc::*;
pub use lua_value::{
    LuaClosure, LuaProto, LuaString, LuaTable, LuaThread, LuaUpvalue, LuaUserdata, LuaValue,
};
