//! Cobble embedding façade.
//!
//! ```text
//! AST → Engine::compile (type system + emitter) → Executable
//!         → Vm (reset / run / call) → global read-back
//! ```
//!
//! An [`Engine`] holds one target description and one host registry.
//! Registration happens before compilation; the emitter sees every
//! binding as a callable declaration, and the VM dispatches host calls
//! back through the same descriptors.

mod engine;
mod header;

pub use engine::Engine;
pub use header::header_text;
