//! The compiled program artifacts.
//!
//! An [`Executable`] is the emitter's output: globals with assigned
//! absolute offsets, functions with resolved entry addresses, the flat
//! instruction stream, the interned string data, and the target the
//! program was compiled against. It is immutable once built and may be
//! shared read-only across threads; each VM instance executing it owns its
//! own mutable stack.

use crate::op::Op;
use cobble_types::{FunctionSig, TargetDesc, Type};
use std::sync::Arc;

/// Addresses with this bit set point into the executable's read-only
/// string data instead of the value stack.
pub const DATA_BIT: u64 = 1 << 63;

/// A compiled variable: name, frame (or absolute) offset, and type.
/// Offsets are assigned during scope traversal and never renumbered.
#[derive(Debug, Clone)]
pub struct CompiledVariable {
    pub name: String,
    pub ty: Arc<Type>,
    pub offset: i32,
}

/// How a compiled function is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Compiled bytecode at a resolved entry offset.
    Bytecode {
        entry: u32,
        param_slots: u32,
        local_slots: u32,
        ret_slots: u32,
    },
    /// A registered native binding, dispatched through the interop
    /// trampoline.
    Host { binding: u32 },
    /// A pure declaration with no body.
    Declared,
}

/// A compiled function: name, qualifying context, signature, and body.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub qualifier: Option<String>,
    pub sig: Arc<FunctionSig>,
    pub kind: FunctionKind,
}

/// The compiled artifact.
#[derive(Debug, Clone)]
pub struct Executable {
    /// The target description the program was compiled against.
    pub target: TargetDesc,
    /// Globals in declaration order, each with an absolute stack offset.
    pub globals: Vec<CompiledVariable>,
    /// Functions in declaration order.
    pub functions: Vec<CompiledFunction>,
    /// The flat instruction stream.
    pub code: Vec<Op>,
    /// NUL-terminated string constants, addressed via [`DATA_BIT`].
    pub strings: Vec<u8>,
    /// Total stack cells occupied by globals.
    pub global_slots: u32,
    /// Function-table index of the synthesized `(init)` sequence that runs
    /// the global initializers and ends in `Halt`.
    pub init_function: u32,
}

impl Executable {
    /// Look up an unqualified function by name. Returns the first
    /// declaration-order match (overload selection happens at emit time).
    pub fn find_function(&self, name: &str) -> Option<(u32, &CompiledFunction)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.qualifier.is_none() && f.name == name)
            .map(|(i, f)| (i as u32, f))
    }

    /// Look up a global by name.
    pub fn find_global(&self, name: &str) -> Option<&CompiledVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Read a NUL-terminated string out of the data space.
    pub fn data_str(&self, addr: u64) -> Option<&[u8]> {
        let start = (addr & !DATA_BIT) as usize;
        let bytes = self.strings.get(start..)?;
        let end = bytes.iter().position(|&b| b == 0)?;
        Some(&bytes[..end])
    }
}
