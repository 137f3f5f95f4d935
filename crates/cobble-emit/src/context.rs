//! Emission state: scopes, frame offsets, loop contexts, and two-phase
//! label resolution.
//!
//! Scopes assign frame offsets top-down — globals get absolute offsets
//! from zero, parameters sit at negative offsets below the frame base, and
//! locals count up from zero, monotonically per function (block exit never
//! reuses a slot). Offsets are never renumbered once assigned.
//!
//! A [`Label`] starts unresolved; branches against it record patch sites,
//! and binding it rewrites them. A function that finishes compiling with
//! an unresolved label is an internal fault, not a diagnostic.

use crate::error::{EmitFault, EmitResult};
use cobble_bytecode::{CompiledFunction, CompiledVariable, Op, Value, DATA_BIT};
use cobble_interop::HostRegistry;
use cobble_types::ast::TypeName;
use cobble_types::{DiagCode, DiagnosticSink, Span, Type, TypeStore};
use std::collections::HashMap;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Labels & loops
// ══════════════════════════════════════════════════════════════════════════════

/// An emitter-local symbolic jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub(crate) usize);

#[derive(Debug)]
struct LabelState {
    target: Option<u32>,
    patches: Vec<usize>,
}

/// The break/continue pair a loop or switch pushes. A switch has no
/// continue target of its own; `continue` skips it and binds to the
/// innermost enclosing loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopCtx {
    pub break_label: Label,
    pub continue_label: Option<Label>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Scopes
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    vars: Vec<CompiledVariable>,
}

/// Where a resolved variable lives.
#[derive(Debug, Clone)]
pub(crate) enum VarRef {
    Global(u32),
    Frame(i32),
}

// ══════════════════════════════════════════════════════════════════════════════
// Emitter
// ══════════════════════════════════════════════════════════════════════════════

/// State carried through one compilation.
pub struct Emitter<'a> {
    pub(crate) store: TypeStore,
    pub(crate) sink: &'a mut DiagnosticSink,
    pub(crate) registry: &'a HostRegistry,

    pub(crate) code: Vec<Op>,
    pub(crate) globals: Vec<CompiledVariable>,
    pub(crate) functions: Vec<CompiledFunction>,
    pub(crate) strings: Vec<u8>,
    string_index: HashMap<String, u64>,

    scopes: Vec<Scope>,
    pub(crate) loops: Vec<LoopCtx>,
    labels: Vec<LabelState>,
    label_base: usize,

    /// Declared struct and enum types by name.
    pub(crate) named_types: HashMap<String, Arc<Type>>,
    /// Bare enumerator constants: name → (value, enum type).
    pub(crate) enum_consts: HashMap<String, (i64, Arc<Type>)>,

    pub(crate) next_global: u32,
    pub(crate) next_local: u32,
    pub(crate) current_ret: Arc<Type>,
    pub(crate) current_fn: String,
    /// Function-table index of the synthesized `(init)` sequence.
    pub(crate) init_index: Option<u32>,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        store: TypeStore,
        registry: &'a HostRegistry,
        sink: &'a mut DiagnosticSink,
    ) -> Self {
        let current_ret = store.void();
        Self {
            store,
            sink,
            registry,
            code: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            strings: Vec::new(),
            string_index: HashMap::new(),
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                vars: Vec::new(),
            }],
            loops: Vec::new(),
            labels: Vec::new(),
            label_base: 0,
            named_types: HashMap::new(),
            enum_consts: HashMap::new(),
            next_global: 0,
            next_local: 0,
            current_ret,
            current_fn: String::new(),
            init_index: None,
        }
    }

    /// Seal the emitted program into its immutable artifact.
    pub(crate) fn into_executable(self, target: cobble_types::TargetDesc) -> cobble_bytecode::Executable {
        cobble_bytecode::Executable {
            target,
            globals: self.globals,
            functions: self.functions,
            code: self.code,
            strings: self.strings,
            global_slots: self.next_global,
            init_function: self.init_index.expect("init sequence emitted"),
        }
    }

    // ── Code emission ────────────────────────────────────────────────────

    pub(crate) fn emit(&mut self, op: Op) {
        self.code.push(op);
    }

    pub(crate) fn emit_const(&mut self, v: Value) {
        self.code.push(Op::Const(v));
    }

    /// Current instruction offset.
    pub(crate) fn here(&self) -> u32 {
        self.code.len() as u32
    }

    // ── Labels ───────────────────────────────────────────────────────────

    /// Create an unresolved label.
    pub(crate) fn new_label(&mut self) -> Label {
        self.labels.push(LabelState {
            target: None,
            patches: Vec::new(),
        });
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current instruction offset, patching every
    /// branch emitted against it so far. A label resolves exactly once.
    pub(crate) fn bind(&mut self, label: Label) {
        let target = self.here();
        let state = &mut self.labels[label.0];
        debug_assert!(state.target.is_none(), "label bound twice");
        state.target = Some(target);
        for at in std::mem::take(&mut state.patches) {
            patch_branch(&mut self.code[at], target);
        }
    }

    fn branch_target(&mut self, label: Label) -> u32 {
        let at = self.code.len();
        match self.labels[label.0].target {
            Some(t) => t,
            None => {
                self.labels[label.0].patches.push(at);
                u32::MAX // patched when the label is bound
            }
        }
    }

    pub(crate) fn emit_jump(&mut self, label: Label) {
        let t = self.branch_target(label);
        self.code.push(Op::Jump(t));
    }

    pub(crate) fn emit_branch_zero(&mut self, label: Label) {
        let t = self.branch_target(label);
        self.code.push(Op::BranchZero(t));
    }

    pub(crate) fn emit_branch_nonzero(&mut self, label: Label) {
        let t = self.branch_target(label);
        self.code.push(Op::BranchNonZero(t));
    }

    pub(crate) fn emit_branch_zero_peek(&mut self, label: Label) {
        let t = self.branch_target(label);
        self.code.push(Op::BranchZeroPeek(t));
    }

    pub(crate) fn emit_branch_nonzero_peek(&mut self, label: Label) {
        let t = self.branch_target(label);
        self.code.push(Op::BranchNonZeroPeek(t));
    }

    /// Start tracking labels for a new function body.
    pub(crate) fn begin_function_labels(&mut self) {
        self.label_base = self.labels.len();
    }

    /// Verify every label created since [`Self::begin_function_labels`]
    /// resolved. An unresolved label here is a toolchain bug.
    pub(crate) fn finish_function_labels(&mut self, function: &str) -> EmitResult<()> {
        let count = self.labels[self.label_base..]
            .iter()
            .filter(|l| l.target.is_none())
            .count();
        if count > 0 {
            return Err(EmitFault::UnresolvedLabel {
                function: function.to_string(),
                count,
            });
        }
        Ok(())
    }

    // ── Scopes & variables ───────────────────────────────────────────────

    pub(crate) fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            vars: Vec::new(),
        });
    }

    pub(crate) fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    pub(crate) fn in_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Define a local in the current scope at the next frame offset.
    pub(crate) fn define_local(
        &mut self,
        name: &str,
        ty: Arc<Type>,
        span: Span,
    ) -> i32 {
        self.check_duplicate(name, span);
        let offset = self.next_local as i32;
        self.next_local += ty.slot_count();
        let scope = self.scopes.last_mut().expect("no scope");
        scope.vars.push(CompiledVariable {
            name: name.to_string(),
            ty,
            offset,
        });
        offset
    }

    /// Define a parameter at an explicit (negative) frame offset.
    pub(crate) fn define_param(&mut self, name: &str, ty: Arc<Type>, offset: i32) {
        let scope = self.scopes.last_mut().expect("no scope");
        scope.vars.push(CompiledVariable {
            name: name.to_string(),
            ty,
            offset,
        });
    }

    /// Define a global at the next absolute offset.
    pub(crate) fn define_global(&mut self, name: &str, ty: Arc<Type>, span: Span) -> u32 {
        self.check_duplicate(name, span);
        let offset = self.next_global;
        self.next_global += ty.slot_count();
        let var = CompiledVariable {
            name: name.to_string(),
            ty,
            offset: offset as i32,
        };
        self.scopes[0].vars.push(var.clone());
        self.globals.push(var);
        offset
    }

    fn check_duplicate(&mut self, name: &str, span: Span) {
        let scope = self.scopes.last().expect("no scope");
        if scope.vars.iter().any(|v| v.name == name) {
            self.sink.error(
                DiagCode::DUPLICATE_DEFINITION,
                span,
                format!("'{name}' is already defined in this scope"),
            );
        }
    }

    /// Resolve a name innermost-first.
    pub(crate) fn lookup_var(&self, name: &str) -> Option<(VarRef, Arc<Type>)> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.vars.iter().rev().find(|v| v.name == name) {
                let r = match scope.kind {
                    ScopeKind::Global => VarRef::Global(v.offset as u32),
                    _ => VarRef::Frame(v.offset),
                };
                return Some((r, v.ty.clone()));
            }
        }
        None
    }

    /// Allocate an anonymous scratch cell in the current frame.
    pub(crate) fn alloc_temp(&mut self) -> i32 {
        let offset = self.next_local as i32;
        self.next_local += 1;
        offset
    }

    // ── Strings ──────────────────────────────────────────────────────────

    /// Intern a NUL-terminated string constant, returning its data-space
    /// address. Identical literals share one entry.
    pub(crate) fn intern_string(&mut self, s: &str) -> u64 {
        if let Some(&addr) = self.string_index.get(s) {
            return addr;
        }
        let addr = DATA_BIT | self.strings.len() as u64;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.string_index.insert(s.to_string(), addr);
        addr
    }

    // ── Type resolution ──────────────────────────────────────────────────

    /// Resolve a syntactic type name to a semantic type. Unknown names
    /// report a diagnostic and fall back to `int` so emission continues.
    pub(crate) fn resolve_type_name(&mut self, tn: &TypeName) -> Arc<Type> {
        let base = self
            .store
            .primitive(&tn.name)
            .or_else(|| self.named_types.get(&tn.name).cloned());
        let mut ty = match base {
            Some(t) => t,
            None => {
                self.sink.error(
                    DiagCode::UNKNOWN_TYPE,
                    tn.span,
                    format!("unknown type '{}'", tn.name),
                );
                self.store.int()
            }
        };
        for _ in 0..tn.pointer_depth {
            ty = self.store.pointer_to(&ty);
        }
        ty
    }
}

fn patch_branch(op: &mut Op, target: u32) {
    match op {
        Op::Jump(t)
        | Op::BranchZero(t)
        | Op::BranchNonZero(t)
        | Op::BranchZeroPeek(t)
        | Op::BranchNonZeroPeek(t) => *t = target,
        other => unreachable!("patched instruction {other:?} is not a branch"),
    }
}
