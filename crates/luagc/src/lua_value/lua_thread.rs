use crate::LuaValue;

/// Lua Thread (coroutine)
/// The value stack is the only mutator state the collector needs to see.
/// Stack writes are not barriered: a thread is re-traversed in the atomic phase.
#[derive(Debug, Clone)]
pub struct LuaThread {
    pub(crate) stack: Vec<LuaValue>,
}

impl LuaThread {
    pub fn new() -> Self {
        LuaThread { stack: Vec::new() }
    }

    pub fn stack(&self) -> &[LuaValue] {
        &self.stack
    }

    #[inline]
    pub fn stack_top(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, value: LuaValue) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<LuaValue> {
        self.stack.pop()
    }

    pub fn get(&self, index: usize) -> Option<LuaValue> {
        self.stack.get(index).copied()
    }

    /// Overwrite a slot; out-of-range writes grow the stack with nils
    pub fn set(&mut self, index: usize, value: LuaValue) {
        if index >= self.stack.len() {
            self.stack.resize(index + 1, LuaValue::Nil);
        }
        self.stack[index] = value;
    }

    pub fn truncate(&mut self, top: usize) {
        self.stack.truncate(top);
    }
}

impl Default for LuaThread {
    fn default() -> Self {
        Self::new()
    }
}
