//! Cobble bytecode and value model.
//!
//! This crate defines the vocabulary both halves of the toolchain must
//! agree on: the untagged 8-byte [`Value`] cell, the [`Op`] instruction set
//! with its width-selection tables, the shared arithmetic kernels used by
//! constant folding and the virtual machine alike, and the immutable
//! [`Executable`] artifact the emitter produces and the VM runs.

mod kernel;
mod op;
mod program;
mod value;

pub use kernel::{apply_binary, apply_conv, apply_unary, KernelError};
pub use op::{select_binary, select_unary, BinFamily, Op, UnFamily, Width};
pub use program::{
    CompiledFunction, CompiledVariable, Executable, FunctionKind, DATA_BIT,
};
pub use value::Value;
