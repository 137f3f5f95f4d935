//! Native interop layer.
//!
//! Exposes host-side callables to VM code and VM-side values to the host.
//! Every host function is registered through a C-style declaration string
//! plus a callable, producing an explicit [`NativeBinding`] descriptor —
//! (name, parameter types, return type, invocable) — that the VM
//! dispatches through one uniform trampoline. Whole host objects register
//! as synthetic opaque structs whose members are their bound methods.

mod decl;
mod marshal;
mod registry;

pub use decl::{decl_for, parse_decl};
pub use marshal::{decode_arg, encode_result};
pub use registry::{
    HostError, HostObject, HostRegistry, InteropError, NativeBinding, NativeFn, NativeValue,
};
