//! Emitter fault types.
//!
//! These are internal-consistency failures in the toolchain itself, not
//! user diagnostics: they abort the current compilation instead of being
//! reported and tolerated.

use thiserror::Error;

/// Internal emitter faults.
#[derive(Debug, Error)]
pub enum EmitFault {
    /// A function finished compiling with unresolved jump targets.
    #[error("function '{function}' has {count} unresolved label(s)")]
    UnresolvedLabel { function: String, count: usize },

    /// An AST construct reached emission with no implemented lowering.
    #[error("no lowering for {0}")]
    Unlowered(&'static str),
}

/// Emitter result type alias.
pub type EmitResult<T> = Result<T, EmitFault>;
