//! Per-function compilation frames: locals, upvalues, scope depth.

use buzz_core::intern::InternedString;
use buzz_types::TypeId;

/// Slot caps are observable in diagnostics and in byte-code slot encoding.
pub const MAX_LOCALS: usize = 255;
pub const MAX_UPVALUES: usize = 255;

/// A local variable slot. `depth == -1` marks a declared-but-uninitialized
/// local: reading it is the read-own-initializer error.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: InternedString,
    pub type_def: TypeId,
    pub depth: i32,
    pub is_captured: bool,
    pub constant: bool,
}

/// A variable captured from an enclosing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpValue {
    /// Local slot in the enclosing frame when `is_local`, otherwise an
    /// upvalue index of the enclosing frame.
    pub index: u8,
    pub is_local: bool,
}

/// Per-function compilation context. Frames form a stack; `enclosing` points
/// into it.
#[derive(Debug)]
pub struct Frame {
    pub enclosing: Option<usize>,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpValue>,
    pub scope_depth: i32,
    /// The declared return type of the function being built.
    pub return_type: TypeId,
}

impl Frame {
    pub fn new(enclosing: Option<usize>, return_type: TypeId) -> Self {
        Self {
            enclosing,
            locals: Vec::new(),
            upvalues: Vec::new(),
            scope_depth: 0,
            return_type,
        }
    }
}
