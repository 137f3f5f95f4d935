//! Shared types for the Cobble toolchain.
//!
//! This crate defines source spans, the diagnostics model, target-machine
//! descriptions, the semantic type system, and the AST node types consumed
//! by the emitter.

pub mod ast;
mod diag;
mod span;
mod target;
pub mod ty;

pub use diag::{
    DiagCategory, DiagCode, Diagnostic, DiagnosticSink, Severity, MAX_DIAGNOSTICS,
};
pub use span::Span;
pub use target::TargetDesc;
pub use ty::{
    DefaultArg, EnumDef, FloatWidth, FunctionSig, IntWidth, Member, MemberKind, Param,
    StructDef, Type, TypeStore,
};
