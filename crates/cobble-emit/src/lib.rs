//! The Cobble emitter.
//!
//! Turns one AST translation unit (built by the parser collaborator) into
//! a populated [`cobble_bytecode::Executable`]:
//!
//! ```text
//! AST → Emitter (type resolution, scopes, two-phase labels, loop
//!       contexts, constant folding) → bytecode + globals + functions
//! ```
//!
//! Semantic problems are reported to the [`cobble_types::DiagnosticSink`]
//! and emission continues with a safe fallback, so one pass surfaces many
//! diagnostics. Internal-consistency failures ([`EmitFault`]) abort the
//! compilation.

mod consts;
mod context;
mod decl;
mod error;
mod expr;
mod stmt;

pub use decl::compile;
pub use error::{EmitFault, EmitResult};
