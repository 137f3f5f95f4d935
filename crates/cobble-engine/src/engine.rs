//! The engine: one target, one registry, many compilations.

use cobble_bytecode::Executable;
use cobble_emit::EmitFault;
use cobble_interop::{
    decode_arg, HostRegistry, InteropError, NativeFn, NativeValue,
};
use cobble_types::ast::Unit;
use cobble_types::{DiagnosticSink, TargetDesc};
use cobble_vm::Vm;

/// The embedding surface: choose a target, register host callables and
/// objects, compile translation units, and execute them.
///
/// An engine is single-threaded; independent compilations for different
/// targets each get their own engine.
pub struct Engine {
    target: TargetDesc,
    registry: HostRegistry,
}

impl Engine {
    /// Create an engine for one target ABI.
    pub fn new(target: TargetDesc) -> Self {
        Self {
            target,
            registry: HostRegistry::new(target),
        }
    }

    pub fn target(&self) -> &TargetDesc {
        &self.target
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Register an internal function from a declaration string plus a
    /// native callable.
    pub fn register_function(
        &mut self,
        decl: &str,
        func: NativeFn,
    ) -> Result<u32, InteropError> {
        self.registry.register(decl, func)
    }

    /// Register a whole host object; its methods become members of a
    /// synthetic opaque struct VM code addresses by the object's name.
    pub fn register_object(
        &mut self,
        name: &str,
        methods: Vec<(&str, NativeFn)>,
    ) -> Result<(), InteropError> {
        self.registry.register_object(name, methods)
    }

    /// Compile a translation unit. Semantic problems land in `sink` and
    /// do not abort; the `Err` variant is an internal-consistency fault.
    pub fn compile(
        &self,
        unit: &Unit,
        sink: &mut DiagnosticSink,
    ) -> Result<Executable, EmitFault> {
        cobble_emit::compile(unit, self.target, &self.registry, sink)
    }

    /// A virtual machine over a compiled executable, wired to this
    /// engine's registry.
    pub fn vm<'a>(&'a self, exe: &'a Executable) -> Vm<'a> {
        Vm::new(exe, &self.registry)
    }

    /// Read a global back as a host-native value, decoded through the
    /// primitive decode table: a signed 32-bit global decodes its cell's
    /// Int32 interpretation, an unsigned 64-bit one stays unsigned, and
    /// so on.
    pub fn decode_global(
        &self,
        exe: &Executable,
        vm: &Vm<'_>,
        name: &str,
    ) -> Option<NativeValue> {
        let var = exe.find_global(name)?;
        let cell = *vm.global_cells(name)?.first()?;
        decode_arg(&var.ty, cell, exe).ok()
    }

    /// Generated header text for the configured target: the synthesized
    /// fixed-width integer typedefs.
    pub fn header_text(&self) -> String {
        crate::header::header_text(&self.target)
    }
}
