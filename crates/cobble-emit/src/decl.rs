//! Translation-unit lowering.
//!
//! Declarations process in source order: structs compute member offsets
//! and register their nominal type before their methods compile; enums
//! register their members as integral constants; globals take absolute
//! offsets and queue their initializers; functions compile bottom-up into
//! the shared instruction stream. After the walk, the queued global
//! initializers become a synthesized `(init)` sequence ending in `Halt`.

use crate::context::{Emitter, ScopeKind};
use crate::error::EmitResult;
use crate::expr::Place;
use cobble_bytecode::{CompiledFunction, Executable, FunctionKind, Op, Value};
use cobble_interop::HostRegistry;
use cobble_types::ast::{
    Decl, EnumDecl, Expr, FuncDecl, StructDecl, StructMember, Unit, VarDecl,
};
use cobble_types::{
    DefaultArg, DiagCode, DiagnosticSink, FunctionSig, Member, MemberKind, Param, StructDef,
    TargetDesc, Type, TypeStore,
};
use std::sync::Arc;

/// Name of the synthesized global-initializer function. Parenthesized so
/// no source identifier can collide with or call it.
const INIT_NAME: &str = "(init)";

/// Compile one translation unit against a target and a host registry.
///
/// Semantic diagnostics land in `sink` and do not stop compilation;
/// the `Err` variant is reserved for internal-consistency faults.
pub fn compile(
    unit: &Unit,
    target: TargetDesc,
    registry: &HostRegistry,
    sink: &mut DiagnosticSink,
) -> EmitResult<Executable> {
    let store = TypeStore::new(target);
    let mut em = Emitter::new(store, registry, sink);
    em.seed_registry();
    em.emit_unit(unit)?;
    Ok(em.into_executable(target))
}

/// A pending global initializer: (offset, type, expression).
type PendingInit = (u32, Arc<Type>, Expr);

impl<'a> Emitter<'a> {
    /// Expose every registry binding as a callable function and every
    /// host object as an opaque struct global.
    pub(crate) fn seed_registry(&mut self) {
        for (i, b) in self.registry.bindings().iter().enumerate() {
            self.functions.push(CompiledFunction {
                name: b.name.clone(),
                qualifier: b.qualifier.clone(),
                sig: b.sig.clone(),
                kind: FunctionKind::Host { binding: i as u32 },
            });
        }
        let objects: Vec<_> = self
            .registry
            .objects()
            .iter()
            .map(|o| (o.name.clone(), o.ty.clone()))
            .collect();
        for (name, ty) in objects {
            if let Type::Struct(def) = &*ty {
                self.named_types.insert(def.name.clone(), ty.clone());
            }
            let span = cobble_types::Span::point(0, 0);
            self.define_global(&name, ty, span);
        }
    }

    pub(crate) fn emit_unit(&mut self, unit: &Unit) -> EmitResult<()> {
        let mut pending: Vec<PendingInit> = Vec::new();
        for decl in &unit.decls {
            match decl {
                Decl::Struct(sd) => self.declare_struct(sd)?,
                Decl::Enum(ed) => self.declare_enum(ed),
                Decl::Var(vd) => self.declare_global(vd, &mut pending),
                Decl::Func(fd) => self.declare_function(fd, None)?,
            }
        }
        self.emit_init_function(pending)
    }

    // ── Structs ──────────────────────────────────────────────────────────

    fn declare_struct(&mut self, sd: &StructDecl) -> EmitResult<()> {
        let name = sd.name.name.clone();
        if self.named_types.contains_key(&name) {
            self.sink.error(
                DiagCode::DUPLICATE_DEFINITION,
                sd.name.span,
                format!("type '{name}' is already defined"),
            );
            return Ok(());
        }

        // Nominal equality lets a provisional empty definition stand in
        // while field types (including Self pointers) resolve.
        let provisional = Arc::new(Type::Struct(Arc::new(StructDef {
            name: name.clone(),
            members: Vec::new(),
        })));
        self.named_types.insert(name.clone(), provisional);

        let mut members = Vec::new();
        let mut slot_offset = 0u32;
        let mut byte_offset = 0u32;
        for m in &sd.members {
            match m {
                StructMember::Field(field) => {
                    let base = self.resolve_type_name(&field.ty);
                    let ty = self.declarator_type(&base, &field.array, field.span);
                    if members.iter().any(|mm: &Member| mm.name == field.name.name) {
                        self.sink.error(
                            DiagCode::DUPLICATE_DEFINITION,
                            field.name.span,
                            format!("duplicate member '{}'", field.name.name),
                        );
                        continue;
                    }
                    let bytes = self.store.byte_size_or_int(&ty, field.span, self.sink);
                    members.push(Member {
                        name: field.name.name.clone(),
                        kind: MemberKind::Field {
                            ty: ty.clone(),
                            slot_offset,
                            byte_offset,
                        },
                    });
                    slot_offset += ty.slot_count();
                    byte_offset += bytes;
                }
                StructMember::Method(method) => {
                    let sig = self.build_sig(method, Some(&name), true);
                    members.push(Member {
                        name: method.name.name.clone(),
                        kind: MemberKind::Method { sig },
                    });
                }
            }
        }

        let ty = Arc::new(Type::Struct(Arc::new(StructDef {
            name: name.clone(),
            members,
        })));
        self.named_types.insert(name.clone(), ty);

        // Method bodies compile once the full definition is in place.
        for m in &sd.members {
            if let StructMember::Method(method) = m {
                self.declare_function(method, Some(&name))?;
            }
        }
        Ok(())
    }

    // ── Enums ────────────────────────────────────────────────────────────

    fn declare_enum(&mut self, ed: &EnumDecl) {
        let name = ed.name.name.clone();
        if self.named_types.contains_key(&name) {
            self.sink.error(
                DiagCode::DUPLICATE_DEFINITION,
                ed.name.span,
                format!("type '{name}' is already defined"),
            );
            return;
        }
        let mut members = Vec::new();
        let mut next = 0i64;
        for m in &ed.members {
            let value = match &m.value {
                Some(e) => match self.eval_const(e) {
                    Some((v, _)) => v.as_i64(),
                    None => {
                        self.sink.error(
                            DiagCode::NONCONSTANT_CASE,
                            e.span,
                            "enumerator value is not a constant expression",
                        );
                        next
                    }
                },
                None => next,
            };
            next = value.wrapping_add(1);
            members.push((m.name.name.clone(), value));
        }
        let ty = Arc::new(Type::Enum(Arc::new(cobble_types::EnumDef {
            name: name.clone(),
            members: members.clone(),
        })));
        self.named_types.insert(name, ty.clone());
        for (member_name, value) in members {
            if self.enum_consts.contains_key(&member_name) {
                self.sink.error(
                    DiagCode::DUPLICATE_DEFINITION,
                    ed.span,
                    format!("enumerator '{member_name}' is already defined"),
                );
                continue;
            }
            self.enum_consts.insert(member_name, (value, ty.clone()));
        }
    }

    // ── Globals ──────────────────────────────────────────────────────────

    fn declare_global(&mut self, vd: &VarDecl, pending: &mut Vec<PendingInit>) {
        let base = self.resolve_type_name(&vd.ty);
        let ty = self.declarator_type(&base, &vd.array, vd.span);
        let ty = crate::stmt::complete_array_len(ty, vd.init.as_ref());
        if ty.is_void() {
            self.sink.error(
                DiagCode::VOID_VALUE,
                vd.span,
                format!("variable '{}' declared void", vd.name.name),
            );
        }
        let offset = self.define_global(&vd.name.name, ty.clone(), vd.name.span);
        if let Some(init) = &vd.init {
            pending.push((offset, ty, init.clone()));
        }
    }

    /// The synthesized `(init)` function: run every global initializer in
    /// declaration order, then `Halt`.
    fn emit_init_function(&mut self, pending: Vec<PendingInit>) -> EmitResult<()> {
        self.begin_function_labels();
        self.push_scope(ScopeKind::Function);
        self.next_local = 0;
        self.current_ret = self.store.void();
        self.current_fn = INIT_NAME.to_string();

        let entry = self.here();
        for (offset, ty, init) in pending {
            self.emit_initializer(Place::Global { offset, ty }, &init)?;
        }
        self.emit(Op::Halt);

        self.finish_function_labels(INIT_NAME)?;
        self.pop_scope();
        let init_index = self.functions.len() as u32;
        let sig = Arc::new(FunctionSig {
            ret: self.store.void(),
            params: Vec::new(),
            is_instance: false,
            qualifier: None,
        });
        self.functions.push(CompiledFunction {
            name: INIT_NAME.to_string(),
            qualifier: None,
            sig,
            kind: FunctionKind::Bytecode {
                entry,
                param_slots: 0,
                local_slots: self.next_local,
                ret_slots: 0,
            },
        });
        self.init_index = Some(init_index);
        Ok(())
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn build_sig(
        &mut self,
        fd: &FuncDecl,
        qualifier: Option<&str>,
        is_instance: bool,
    ) -> Arc<FunctionSig> {
        let ret = self.resolve_type_name(&fd.ret);
        let mut params = Vec::new();
        for p in &fd.params {
            let ty = self.resolve_type_name(&p.ty);
            if ty.is_void() {
                self.sink.error(
                    DiagCode::VOID_VALUE,
                    p.span,
                    format!("parameter '{}' declared void", p.name.name),
                );
            }
            let default = match &p.default {
                Some(e) => match self.eval_const(e) {
                    Some((v, dty)) => {
                        if dty.is_integral() {
                            Some(DefaultArg::Int(v.as_i64()))
                        } else {
                            Some(DefaultArg::Float(v.as_f64()))
                        }
                    }
                    None => match &e.kind {
                        cobble_types::ast::ExprKind::FloatLit { value, .. } => {
                            Some(DefaultArg::Float(*value))
                        }
                        _ => {
                            self.sink.error(
                                DiagCode::NONCONSTANT_CASE,
                                e.span,
                                "default argument is not a constant expression",
                            );
                            None
                        }
                    },
                },
                None => None,
            };
            params.push(Param {
                name: p.name.name.clone(),
                ty,
                default,
            });
        }
        Arc::new(FunctionSig {
            ret,
            params,
            is_instance,
            qualifier: qualifier.map(String::from),
        })
    }

    fn declare_function(&mut self, fd: &FuncDecl, qualifier: Option<&str>) -> EmitResult<()> {
        let is_instance = qualifier.is_some();
        let sig = self.build_sig(fd, qualifier, is_instance);
        let name = fd.name.name.clone();

        // Match an earlier declaration (or clash with a definition).
        let existing = self.functions.iter().position(|f| {
            f.name == name
                && f.qualifier.as_deref() == qualifier
                && f.sig.params.len() == sig.params.len()
                && f.sig
                    .params
                    .iter()
                    .zip(sig.params.iter())
                    .all(|(a, b)| a.ty == b.ty)
        });

        let Some(body) = &fd.body else {
            if existing.is_none() {
                self.functions.push(CompiledFunction {
                    name,
                    qualifier: qualifier.map(String::from),
                    sig,
                    kind: FunctionKind::Declared,
                });
            }
            return Ok(());
        };

        let index = match existing {
            Some(i) => {
                if !matches!(self.functions[i].kind, FunctionKind::Declared) {
                    self.sink.error(
                        DiagCode::DUPLICATE_DEFINITION,
                        fd.name.span,
                        format!("function '{name}' is already defined"),
                    );
                    return Ok(());
                }
                self.functions[i].sig = sig.clone();
                i
            }
            None => {
                self.functions.push(CompiledFunction {
                    name: name.clone(),
                    qualifier: qualifier.map(String::from),
                    sig: sig.clone(),
                    kind: FunctionKind::Declared,
                });
                self.functions.len() - 1
            }
        };

        // ── Body ─────────────────────────────────────────────────────────
        self.begin_function_labels();
        self.push_scope(ScopeKind::Function);
        self.next_local = 0;
        self.current_ret = sig.ret.clone();
        self.current_fn = name.clone();

        // Parameters sit at negative offsets below the frame base; the
        // receiver pointer, when present, is the first of them.
        let mut param_slots = 0u32;
        if is_instance {
            param_slots += 1;
        }
        for p in &sig.params {
            param_slots += p.ty.slot_count();
        }
        let mut running = -(param_slots as i32);
        if is_instance {
            let struct_ty = self
                .named_types
                .get(qualifier.expect("instance methods are qualified"))
                .cloned()
                .unwrap_or_else(|| self.store.int());
            let this_ty = self.store.pointer_to(&struct_ty);
            self.define_param("this", this_ty, running);
            running += 1;
        }
        for p in &sig.params {
            self.define_param(&p.name, p.ty.clone(), running);
            running += p.ty.slot_count() as i32;
        }

        let entry = self.here();
        self.emit_stmts(&body.stmts)?;

        // A body that can run off its end still returns: default cells
        // for non-void functions, a bare return otherwise. Always emitted —
        // a forward label bound at the body's end can make this reachable
        // even when the last emitted instruction is a return.
        let ret_slots = sig.ret.slot_count();
        for _ in 0..ret_slots {
            self.emit_const(Value::ZERO);
        }
        self.emit(Op::Return {
            value_slots: ret_slots,
        });

        self.finish_function_labels(&name)?;
        self.pop_scope();
        self.functions[index].kind = FunctionKind::Bytecode {
            entry,
            param_slots,
            local_slots: self.next_local,
            ret_slots,
        };
        Ok(())
    }
}
