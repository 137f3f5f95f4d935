//! The Cobble virtual machine.
//!
//! Executes a compiled [`cobble_bytecode::Executable`] against a value-cell
//! stack: globals occupy a fixed prefix addressed by absolute offset, each
//! call frame addresses its parameters at negative offsets and its locals
//! at positive offsets from the frame base, matching exactly the offsets
//! the emitter assigned. Host calls marshal through the interop layer's
//! binding descriptors.

mod error;
mod machine;

pub use error::VmFault;
pub use machine::{Vm, STACK_LIMIT};
