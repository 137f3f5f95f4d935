//! Runtime fault types.
//!
//! A fault is fatal to the running program — distinct from the user-level
//! diagnostics the emitter reports during compilation.

use thiserror::Error;

/// Unrecoverable runtime faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmFault {
    #[error("value stack exhausted")]
    StackOverflow,

    #[error("invalid address {0:#x}")]
    InvalidAddress(u64),

    #[error("integer division by zero")]
    ZeroDivide,

    #[error("unknown entry function '{0}'")]
    UnknownEntry(String),

    #[error("call to function '{0}' which has no definition")]
    MissingDefinition(String),

    #[error("malformed program: {0}")]
    MalformedProgram(String),

    #[error("host call failed: {0}")]
    Host(String),
}
