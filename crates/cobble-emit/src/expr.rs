//! Expression code generation.
//!
//! Every expression leaves its value's cells on the stack (lowest slot
//! pushed first). Binary operators resolve the arithmetic-converted common
//! type, cast both operands to it, and select the opcode from the
//! (family, width) table. Integral constant expressions fold to a single
//! `Const` before any of that happens.

use crate::context::{Emitter, VarRef};
use crate::error::{EmitFault, EmitResult};
use cobble_bytecode::{
    select_binary, select_unary, BinFamily, FunctionKind, Op, UnFamily, Value, Width,
};
use cobble_types::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use cobble_types::{DiagCode, MemberKind, Span, Type};
use std::sync::Arc;

/// A resolved storage location. `Global` and `Frame` emit no code;
/// `Indirect` means the address has been pushed.
#[derive(Debug, Clone)]
pub(crate) enum Place {
    Global { offset: u32, ty: Arc<Type> },
    Frame { offset: i32, ty: Arc<Type> },
    Indirect { ty: Arc<Type> },
}

impl Place {
    pub(crate) fn ty(&self) -> &Arc<Type> {
        match self {
            Place::Global { ty, .. } | Place::Frame { ty, .. } | Place::Indirect { ty } => ty,
        }
    }
}

impl Emitter<'_> {
    // ══════════════════════════════════════════════════════════════════════
    // Typing
    // ══════════════════════════════════════════════════════════════════════

    /// The type an expression evaluates to. Arrays decay to pointers here;
    /// diagnostics reported during typing deduplicate against emission.
    pub(crate) fn expr_type(&mut self, e: &Expr) -> Arc<Type> {
        let ty = self.undecayed_type(e);
        self.decay(&ty)
    }

    /// Like [`Self::expr_type`] but without array decay — the type
    /// `sizeof` and `&` observe.
    pub(crate) fn undecayed_type(&mut self, e: &Expr) -> Arc<Type> {
        match &e.kind {
            ExprKind::IntLit { value, suffix } => self.int_lit_type(*value, *suffix),
            ExprKind::FloatLit { single, .. } => {
                if *single {
                    self.store.float()
                } else {
                    self.store.double()
                }
            }
            ExprKind::CharLit(_) => self.store.char_(),
            ExprKind::StringLit(_) => {
                let c = self.store.char_();
                self.store.pointer_to(&c)
            }
            ExprKind::Ident(name) => self.ident_type(name, e.span),
            ExprKind::Unary { op, operand } => self.unary_type(*op, operand),
            ExprKind::Binary { op, left, right } => self.binary_type(*op, left, right, e.span),
            ExprKind::Assign { target, .. } => self.expr_type(target),
            ExprKind::Ternary {
                then_expr,
                else_expr,
                ..
            } => {
                let t = self.expr_type(then_expr);
                let f = self.expr_type(else_expr);
                self.ternary_type(&t, &f, e.span)
            }
            ExprKind::Call { callee, args } => {
                let arg_types: Vec<_> = args.iter().map(|a| self.expr_type(a)).collect();
                match self.callee_target(callee, &arg_types, e.span) {
                    Some(idx) => self.functions[idx as usize].sig.ret.clone(),
                    None => self.store.int(),
                }
            }
            ExprKind::Index { base, .. } => {
                let bt = self.expr_type(base);
                match &*bt {
                    Type::Pointer(inner) => inner.clone(),
                    _ => self.store.int(),
                }
            }
            ExprKind::Member { base, member, arrow } => {
                self.member_field_type(base, &member.name, *arrow, e.span)
            }
            ExprKind::Cast { ty, .. } => self.resolve_type_name(ty),
            ExprKind::SizeOfType(_) | ExprKind::SizeOfExpr(_) => {
                self.store.make_int(false, cobble_types::IntWidth::Long)
            }
            ExprKind::InitList(_) => self.store.int(),
        }
    }

    fn decay(&self, ty: &Arc<Type>) -> Arc<Type> {
        if let Type::Array { elem, .. } = &**ty {
            self.store.pointer_to(elem)
        } else {
            ty.clone()
        }
    }

    fn ident_type(&mut self, name: &str, span: Span) -> Arc<Type> {
        if let Some((_, ty)) = self.lookup_var(name) {
            return ty;
        }
        if let Some((_, ty)) = self.enum_consts.get(name) {
            return ty.clone();
        }
        if let Some(member_ty) = self.this_member_type(name) {
            return member_ty;
        }
        if let Some(f) = self
            .functions
            .iter()
            .find(|f| f.qualifier.is_none() && f.name == name)
        {
            return Arc::new(Type::Function(f.sig.clone()));
        }
        self.sink.error(
            DiagCode::UNDEFINED_SYMBOL,
            span,
            format!("unknown symbol '{name}'"),
        );
        self.store.int()
    }

    fn unary_type(&mut self, op: UnaryOp, operand: &Expr) -> Arc<Type> {
        match op {
            UnaryOp::Not => self.store.int(),
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                let t = self.expr_type(operand);
                if t.is_arithmetic() {
                    self.store.integer_promote(&t)
                } else {
                    self.store.int()
                }
            }
            UnaryOp::Deref => {
                let t = self.expr_type(operand);
                match &*t {
                    Type::Pointer(inner) => inner.clone(),
                    _ => self.store.int(),
                }
            }
            UnaryOp::AddrOf => {
                let t = self.undecayed_type(operand);
                self.store.pointer_to(&t)
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.expr_type(operand)
            }
        }
    }

    fn binary_type(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Arc<Type> {
        if op.is_relational() || matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
            return self.store.int();
        }
        let lt = self.expr_type(left);
        let rt = self.expr_type(right);
        if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            return self.store.integer_promote(&lt);
        }
        if lt.is_pointer() && rt.is_integral() {
            return lt;
        }
        if rt.is_pointer() && lt.is_integral() && matches!(op, BinaryOp::Add) {
            return rt;
        }
        if lt.is_pointer() && rt.is_pointer() && matches!(op, BinaryOp::Sub) {
            return self.store.make_int(true, cobble_types::IntWidth::Long);
        }
        self.store.arithmetic_convert(&lt, &rt, span, self.sink)
    }

    fn ternary_type(&mut self, t: &Arc<Type>, f: &Arc<Type>, span: Span) -> Arc<Type> {
        if t == f {
            return t.clone();
        }
        if t.is_arithmetic() && f.is_arithmetic() {
            return self.store.arithmetic_convert(t, f, span, self.sink);
        }
        self.sink.error(
            DiagCode::TYPE_MISMATCH,
            span,
            format!("'?:' branches have incompatible types '{t}' and '{f}'"),
        );
        self.store.int()
    }

    /// Field type behind `base.member` / `base->member`.
    fn member_field_type(
        &mut self,
        base: &Expr,
        member: &str,
        arrow: bool,
        span: Span,
    ) -> Arc<Type> {
        let bt = if arrow {
            let pt = self.expr_type(base);
            match &*pt {
                Type::Pointer(inner) => inner.clone(),
                _ => {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("'->' applied to non-pointer type '{pt}'"),
                    );
                    return self.store.int();
                }
            }
        } else {
            self.undecayed_type(base)
        };
        let Type::Struct(def) = &*bt else {
            self.sink.error(
                DiagCode::UNKNOWN_MEMBER,
                span,
                format!("type '{bt}' has no members"),
            );
            return self.store.int();
        };
        match def.member(member) {
            Some(m) => match &m.kind {
                MemberKind::Field { ty, .. } => ty.clone(),
                MemberKind::Method { sig } => Arc::new(Type::Function(sig.clone())),
            },
            None => {
                self.sink.error(
                    DiagCode::UNKNOWN_MEMBER,
                    span,
                    format!("'{bt}' has no member '{member}'"),
                );
                self.store.int()
            }
        }
    }

    /// If `name` is a field of the current method's receiver, its type.
    fn this_member_type(&self, name: &str) -> Option<Arc<Type>> {
        let (_, this_ty) = self.lookup_var("this")?;
        let Type::Pointer(inner) = &*this_ty else {
            return None;
        };
        let Type::Struct(def) = &**inner else {
            return None;
        };
        match &def.member(name)?.kind {
            MemberKind::Field { ty, .. } => Some(ty.clone()),
            MemberKind::Method { .. } => None,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Emission
    // ══════════════════════════════════════════════════════════════════════

    /// Emit an expression, leaving its cells on the stack. Returns the
    /// value's type.
    pub(crate) fn emit_expr(&mut self, e: &Expr) -> EmitResult<Arc<Type>> {
        if let Some((v, ty)) = self.eval_const(e) {
            self.emit_const(v);
            return Ok(ty);
        }
        match &e.kind {
            // Folded above; kept for completeness.
            ExprKind::IntLit { value, .. } => {
                self.emit_const(Value::from_i64(*value));
                Ok(self.store.int())
            }
            ExprKind::CharLit(c) => {
                self.emit_const(Value::from_i8(*c as i8));
                Ok(self.store.char_())
            }
            // Floating constants load directly; they are not folded.
            ExprKind::FloatLit { value, single } => {
                if *single {
                    self.emit_const(Value::from_f32(*value as f32));
                    Ok(self.store.float())
                } else {
                    self.emit_const(Value::from_f64(*value));
                    Ok(self.store.double())
                }
            }
            ExprKind::StringLit(s) => {
                let addr = self.intern_string(s);
                self.emit_const(Value::from_addr(addr));
                let c = self.store.char_();
                Ok(self.store.pointer_to(&c))
            }
            ExprKind::Ident(name) => self.emit_ident(name, e.span),
            ExprKind::Unary { op, operand } => self.emit_unary(*op, operand, e.span),
            ExprKind::Binary { op, left, right } => self.emit_binary(*op, left, right, e.span),
            ExprKind::Assign { op, target, value } => {
                self.emit_assign(*op, target, value, e.span)
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.emit_ternary(cond, then_expr, else_expr, e.span),
            ExprKind::Call { callee, args } => self.emit_call(callee, args, e.span),
            ExprKind::Index { .. } | ExprKind::Member { .. } => {
                match self.emit_place(e)? {
                    Some(place) => Ok(self.emit_load(place)),
                    None => {
                        self.emit_const(Value::ZERO);
                        Ok(self.store.int())
                    }
                }
            }
            ExprKind::Cast { ty, expr } => {
                let to = self.resolve_type_name(ty);
                let from = self.emit_expr(expr)?;
                self.emit_explicit_cast(&from, &to, e.span);
                Ok(to)
            }
            // sizeof always folds; reaching here means the operand typing
            // already fell back, so load the fallback size.
            ExprKind::SizeOfType(_) | ExprKind::SizeOfExpr(_) => {
                let size = self.store.target().int_size;
                self.emit_const(Value::from_u64(size as u64));
                Ok(self.store.make_int(false, cobble_types::IntWidth::Long))
            }
            ExprKind::InitList(_) => {
                Err(EmitFault::Unlowered("initializer list in expression position"))
            }
        }
    }

    fn emit_ident(&mut self, name: &str, span: Span) -> EmitResult<Arc<Type>> {
        if let Some((var, ty)) = self.lookup_var(name) {
            let place = match var {
                VarRef::Global(offset) => Place::Global { offset, ty },
                VarRef::Frame(offset) => Place::Frame { offset, ty },
            };
            return Ok(self.emit_load(place));
        }
        // Inside a method, a bare field name reads through `this`.
        if self.this_member_type(name).is_some() {
            let place = self.emit_this_member_place(name).expect("field exists");
            return Ok(self.emit_load(place));
        }
        if let Some(idx) = self
            .functions
            .iter()
            .position(|f| f.qualifier.is_none() && f.name == name)
        {
            self.emit_const(Value::from_u64(idx as u64));
            return Ok(Arc::new(Type::Function(self.functions[idx].sig.clone())));
        }
        self.sink.error(
            DiagCode::UNDEFINED_SYMBOL,
            span,
            format!("unknown symbol '{name}'"),
        );
        self.emit_const(Value::ZERO);
        Ok(self.store.int())
    }

    // ── Places ───────────────────────────────────────────────────────────

    /// Resolve an lvalue. Returns `None` (with a diagnostic) when the
    /// expression does not designate storage.
    pub(crate) fn emit_place(&mut self, e: &Expr) -> EmitResult<Option<Place>> {
        match &e.kind {
            ExprKind::Ident(name) => {
                if let Some((var, ty)) = self.lookup_var(name) {
                    return Ok(Some(match var {
                        VarRef::Global(offset) => Place::Global { offset, ty },
                        VarRef::Frame(offset) => Place::Frame { offset, ty },
                    }));
                }
                if self.this_member_type(name).is_some() {
                    return Ok(self.emit_this_member_place(name));
                }
                self.sink.error(
                    DiagCode::NOT_AN_LVALUE,
                    e.span,
                    format!("'{name}' does not designate storage"),
                );
                Ok(None)
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let t = self.emit_expr(operand)?;
                match &*t {
                    Type::Pointer(inner) => Ok(Some(Place::Indirect { ty: inner.clone() })),
                    _ => {
                        self.sink.error(
                            DiagCode::TYPE_MISMATCH,
                            e.span,
                            format!("cannot dereference non-pointer type '{t}'"),
                        );
                        self.emit(Op::Drop);
                        Ok(None)
                    }
                }
            }
            ExprKind::Index { base, index } => {
                let bt = self.emit_expr(base)?;
                let Type::Pointer(elem) = &*bt else {
                    self.sink.error(
                        DiagCode::NOT_INDEXABLE,
                        e.span,
                        format!("type '{bt}' cannot be indexed"),
                    );
                    for _ in 0..bt.slot_count() {
                        self.emit(Op::Drop);
                    }
                    return Ok(None);
                };
                let elem = elem.clone();
                let it = self.emit_expr(index)?;
                self.emit_index_offset(&it, e.span);
                self.emit(Op::PtrAdd(elem.slot_count()));
                Ok(Some(Place::Indirect { ty: elem }))
            }
            ExprKind::Member { base, member, arrow } => {
                self.emit_member_place(base, &member.name, *arrow, e.span)
            }
            _ => {
                self.sink.error(
                    DiagCode::NOT_AN_LVALUE,
                    e.span,
                    "expression is not an lvalue",
                );
                Ok(None)
            }
        }
    }

    fn emit_member_place(
        &mut self,
        base: &Expr,
        member: &str,
        arrow: bool,
        span: Span,
    ) -> EmitResult<Option<Place>> {
        if arrow {
            let pt = self.emit_expr(base)?;
            let Type::Pointer(inner) = &*pt else {
                self.sink.error(
                    DiagCode::TYPE_MISMATCH,
                    span,
                    format!("'->' applied to non-pointer type '{pt}'"),
                );
                self.emit(Op::Drop);
                return Ok(None);
            };
            let inner = inner.clone();
            return match self.field_of(&inner, member, span) {
                Some((slot, ty)) => {
                    self.emit_const(Value::from_i64(slot as i64));
                    self.emit(Op::PtrAdd(1));
                    Ok(Some(Place::Indirect { ty }))
                }
                None => {
                    self.emit(Op::Drop);
                    Ok(None)
                }
            };
        }

        let base_place = match self.emit_place(base)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let bt = base_place.ty().clone();
        let Some((slot, ty)) = self.field_of(&bt, member, span) else {
            if matches!(base_place, Place::Indirect { .. }) {
                self.emit(Op::Drop);
            }
            return Ok(None);
        };
        Ok(Some(match base_place {
            Place::Global { offset, .. } => Place::Global {
                offset: offset + slot,
                ty,
            },
            Place::Frame { offset, .. } => Place::Frame {
                offset: offset + slot as i32,
                ty,
            },
            Place::Indirect { .. } => {
                self.emit_const(Value::from_i64(slot as i64));
                self.emit(Op::PtrAdd(1));
                Place::Indirect { ty }
            }
        }))
    }

    /// Slot offset and type of a struct field, with diagnostics.
    fn field_of(&mut self, ty: &Arc<Type>, member: &str, span: Span) -> Option<(u32, Arc<Type>)> {
        let Type::Struct(def) = &**ty else {
            self.sink.error(
                DiagCode::UNKNOWN_MEMBER,
                span,
                format!("type '{ty}' has no members"),
            );
            return None;
        };
        match def.member(member) {
            Some(m) => match &m.kind {
                MemberKind::Field { ty, slot_offset, .. } => Some((*slot_offset, ty.clone())),
                MemberKind::Method { .. } => {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("method '{member}' used as a value"),
                    );
                    None
                }
            },
            None => {
                self.sink.error(
                    DiagCode::UNKNOWN_MEMBER,
                    span,
                    format!("'{ty}' has no member '{member}'"),
                );
                None
            }
        }
    }

    /// Place of a bare field name inside a method: `this->name`.
    fn emit_this_member_place(&mut self, name: &str) -> Option<Place> {
        let (this_ref, this_ty) = self.lookup_var("this")?;
        let VarRef::Frame(offset) = this_ref else {
            return None;
        };
        let Type::Pointer(inner) = &*this_ty else {
            return None;
        };
        let Type::Struct(def) = &**inner else {
            return None;
        };
        let m = def.member(name)?;
        let MemberKind::Field { ty, slot_offset, .. } = &m.kind else {
            return None;
        };
        let (ty, slot) = (ty.clone(), *slot_offset);
        self.emit(Op::LoadFrame(offset));
        self.emit_const(Value::from_i64(slot as i64));
        self.emit(Op::PtrAdd(1));
        Some(Place::Indirect { ty })
    }

    /// Load the value a place designates; arrays decay to their address.
    pub(crate) fn emit_load(&mut self, place: Place) -> Arc<Type> {
        match place {
            Place::Global { offset, ty } => match &*ty {
                Type::Array { elem, .. } => {
                    self.emit(Op::GlobalAddr(offset));
                    self.store.pointer_to(elem)
                }
                _ => {
                    for i in 0..ty.slot_count() {
                        self.emit(Op::LoadGlobal(offset + i));
                    }
                    ty
                }
            },
            Place::Frame { offset, ty } => match &*ty {
                Type::Array { elem, .. } => {
                    self.emit(Op::FrameAddr(offset));
                    self.store.pointer_to(elem)
                }
                _ => {
                    for i in 0..ty.slot_count() {
                        self.emit(Op::LoadFrame(offset + i as i32));
                    }
                    ty
                }
            },
            Place::Indirect { ty } => match &*ty {
                Type::Array { elem, .. } => self.store.pointer_to(elem),
                _ => {
                    let slots = ty.slot_count();
                    if slots == 1 {
                        let w = self.width_of(&ty).unwrap_or(Width::U64);
                        self.emit(Op::LoadInd(w));
                    } else {
                        self.emit(Op::CopySlots(slots));
                    }
                    ty
                }
            },
        }
    }

    /// Store the top cell into a direct place (scalar widths only).
    fn emit_store_scalar(&mut self, place: &Place) {
        match place {
            Place::Global { offset, .. } => self.emit(Op::StoreGlobal(*offset)),
            Place::Frame { offset, .. } => self.emit(Op::StoreFrame(*offset)),
            Place::Indirect { ty } => {
                let w = self.width_of(ty).unwrap_or(Width::U64);
                self.emit(Op::StoreInd(w));
            }
        }
    }

    // ── Casts ────────────────────────────────────────────────────────────

    /// Cast the top value for an implicit conversion. A zero cast score
    /// reports [`DiagCode::INVALID_CAST`] and leaves the source type;
    /// integer narrowing goes through with a warning.
    pub(crate) fn emit_implicit_cast(&mut self, from: &Arc<Type>, to: &Arc<Type>, span: Span) {
        if from == to {
            return;
        }
        if self.store.score_cast(from, to) == 0 {
            self.sink.error(
                DiagCode::INVALID_CAST,
                span,
                format!("cannot implicitly convert '{from}' to '{to}'"),
            );
            return;
        }
        if from.is_integral() && to.is_integral() {
            let target = self.store.target();
            let sf = from.byte_size(target).unwrap_or(0);
            let st = to.byte_size(target).unwrap_or(0);
            if st < sf {
                self.sink.warning(
                    DiagCode::TYPE_MISMATCH,
                    span,
                    format!("implicit narrowing conversion from '{from}' to '{to}'"),
                );
            }
        }
        self.emit_numeric_cast(from, to);
    }

    /// Explicit cast: arithmetic↔arithmetic, pointer↔pointer, and
    /// pointer↔integer reinterpretations are all allowed.
    fn emit_explicit_cast(&mut self, from: &Arc<Type>, to: &Arc<Type>, span: Span) {
        if from == to || to.is_void() {
            if to.is_void() {
                for _ in 0..from.slot_count() {
                    self.emit(Op::Drop);
                }
            }
            return;
        }
        let ok = (from.is_arithmetic() || from.is_pointer())
            && (to.is_arithmetic() || to.is_pointer());
        if !ok {
            self.sink.error(
                DiagCode::INVALID_CAST,
                span,
                format!("invalid cast from '{from}' to '{to}'"),
            );
            return;
        }
        self.emit_numeric_cast(from, to);
    }

    /// The conversion ops themselves: truth-test for bool targets, `Conv`
    /// when the width classes differ, nothing otherwise.
    pub(crate) fn emit_numeric_cast(&mut self, from: &Arc<Type>, to: &Arc<Type>) {
        if matches!(&**to, Type::Bool) {
            let w = self.width_of(from).unwrap_or(Width::U64);
            self.emit_const(Value::ZERO);
            self.emit(Op::Eq(w));
            self.emit(Op::Not);
            return;
        }
        let (Some(wf), Some(wt)) = (self.width_of(from), self.width_of(to)) else {
            return;
        };
        if wf != wt {
            self.emit(Op::Conv { from: wf, to: wt });
        }
    }

    /// Normalize an index expression to a signed 64-bit element count.
    fn emit_index_offset(&mut self, ty: &Arc<Type>, span: Span) {
        if !ty.is_integral() {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                span,
                format!("index has non-integer type '{ty}'"),
            );
            return;
        }
        if let Some(w) = self.width_of(ty) {
            if w != Width::I64 {
                self.emit(Op::Conv { from: w, to: Width::I64 });
            }
        }
    }

    // ── Conditions & booleans ────────────────────────────────────────────

    /// Emit a condition value for a `BranchZero`/`BranchNonZero` test.
    /// Floats compare against zero so `-0.0` tests false.
    pub(crate) fn emit_condition(&mut self, e: &Expr) -> EmitResult<()> {
        let t = self.emit_expr(e)?;
        let slots = t.slot_count();
        if slots != 1 || !t.is_scalar() {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                e.span,
                format!("type '{t}' is not a condition"),
            );
            for _ in 0..slots {
                self.emit(Op::Drop);
            }
            self.emit_const(Value::ZERO);
            return Ok(());
        }
        if let Some(w) = self.width_of(&t) {
            if w.is_float() {
                self.emit_const(Value::ZERO);
                self.emit(Op::Eq(w));
                self.emit(Op::Not);
            }
        }
        Ok(())
    }

    /// Emit an expression normalized to a 0/1 cell.
    fn emit_bool(&mut self, e: &Expr) -> EmitResult<()> {
        let t = self.emit_expr(e)?;
        if matches!(&*t, Type::Bool) {
            return Ok(());
        }
        let slots = t.slot_count();
        if slots != 1 || !t.is_scalar() {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                e.span,
                format!("type '{t}' is not a condition"),
            );
            for _ in 0..slots {
                self.emit(Op::Drop);
            }
            self.emit_const(Value::ZERO);
            return Ok(());
        }
        let w = self.width_of(&t).unwrap_or(Width::U64);
        self.emit_const(Value::ZERO);
        self.emit(Op::Eq(w));
        self.emit(Op::Not);
        Ok(())
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn emit_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> EmitResult<Arc<Type>> {
        match op {
            UnaryOp::Not => {
                let t = self.emit_expr(operand)?;
                if let Some(w) = self.width_of(&t) {
                    if w.is_float() {
                        // !x for floats is the zero test itself.
                        self.emit_const(Value::ZERO);
                        self.emit(Op::Eq(w));
                        return Ok(self.store.int());
                    }
                }
                self.emit(Op::Not);
                Ok(self.store.int())
            }
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                let t = self.emit_expr(operand)?;
                let needs_int = matches!(op, UnaryOp::BitNot);
                if !t.is_arithmetic() || (needs_int && !t.is_integral()) {
                    self.sink.error(
                        DiagCode::NON_ARITHMETIC,
                        span,
                        format!("operand of unary operator has type '{t}'"),
                    );
                    return Ok(t);
                }
                let pty = self.store.integer_promote(&t);
                self.emit_numeric_cast(&t, &pty);
                if !matches!(op, UnaryOp::Plus) {
                    let w = self.width_of(&pty).unwrap_or(Width::I32);
                    let family = if matches!(op, UnaryOp::Neg) {
                        UnFamily::Neg
                    } else {
                        UnFamily::BitNot
                    };
                    if let Some(sel) = select_unary(family, w) {
                        self.emit(sel);
                    }
                }
                Ok(pty)
            }
            UnaryOp::Deref => {
                let t = self.emit_expr(operand)?;
                match &*t {
                    Type::Pointer(inner) => {
                        let place = Place::Indirect { ty: inner.clone() };
                        Ok(self.emit_load(place))
                    }
                    _ => {
                        self.sink.error(
                            DiagCode::TYPE_MISMATCH,
                            span,
                            format!("cannot dereference non-pointer type '{t}'"),
                        );
                        Ok(self.store.int())
                    }
                }
            }
            UnaryOp::AddrOf => {
                let place = self.emit_place(operand)?;
                match place {
                    Some(Place::Global { offset, ty }) => {
                        self.emit(Op::GlobalAddr(offset));
                        Ok(self.store.pointer_to(&ty))
                    }
                    Some(Place::Frame { offset, ty }) => {
                        self.emit(Op::FrameAddr(offset));
                        Ok(self.store.pointer_to(&ty))
                    }
                    Some(Place::Indirect { ty }) => Ok(self.store.pointer_to(&ty)),
                    None => {
                        self.emit_const(Value::ZERO);
                        let t = self.store.int();
                        Ok(self.store.pointer_to(&t))
                    }
                }
            }
            UnaryOp::PreInc => self.emit_incdec(operand, 1, false, span),
            UnaryOp::PreDec => self.emit_incdec(operand, -1, false, span),
            UnaryOp::PostInc => self.emit_incdec(operand, 1, true, span),
            UnaryOp::PostDec => self.emit_incdec(operand, -1, true, span),
        }
    }

    fn emit_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        // Short-circuit forms never evaluate the right operand when the
        // left one decides.
        if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
            let end = self.new_label();
            self.emit_bool(left)?;
            if matches!(op, BinaryOp::LogicalAnd) {
                self.emit_branch_zero_peek(end);
                self.emit_bool(right)?;
                self.emit(Op::BoolAnd);
            } else {
                self.emit_branch_nonzero_peek(end);
                self.emit_bool(right)?;
                self.emit(Op::BoolOr);
            }
            self.bind(end);
            return Ok(self.store.int());
        }

        let lt = self.expr_type(left);
        let rt = self.expr_type(right);

        // Pointer arithmetic: offset-then-load/store addressing.
        if lt.is_pointer() && rt.is_integral() && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            let elem_slots = pointer_elem_slots(&lt);
            self.emit_expr(left)?;
            let it = self.emit_expr(right)?;
            self.emit_index_offset(&it, span);
            if matches!(op, BinaryOp::Sub) {
                self.emit(Op::Neg(Width::I64));
            }
            self.emit(Op::PtrAdd(elem_slots));
            return Ok(lt);
        }
        if rt.is_pointer() && lt.is_integral() && matches!(op, BinaryOp::Add) {
            let elem_slots = pointer_elem_slots(&rt);
            self.emit_expr(right)?;
            let it = self.emit_expr(left)?;
            self.emit_index_offset(&it, span);
            self.emit(Op::PtrAdd(elem_slots));
            return Ok(rt);
        }
        if lt.is_pointer() && rt.is_pointer() && matches!(op, BinaryOp::Sub) {
            self.emit_expr(left)?;
            self.emit_expr(right)?;
            self.emit(Op::Sub(Width::I64));
            let slots = pointer_elem_slots(&lt);
            if slots > 1 {
                self.emit_const(Value::from_i64(slots as i64));
                self.emit(Op::Div(Width::I64));
            }
            return Ok(self.store.make_int(true, cobble_types::IntWidth::Long));
        }
        if (lt.is_pointer() || rt.is_pointer()) && op.is_relational() {
            self.emit_expr(left)?;
            if !lt.is_pointer() {
                let w = self.width_of(&lt).unwrap_or(Width::I64);
                self.emit(Op::Conv { from: w, to: Width::U64 });
            }
            self.emit_expr(right)?;
            if !rt.is_pointer() {
                let w = self.width_of(&rt).unwrap_or(Width::I64);
                self.emit(Op::Conv { from: w, to: Width::U64 });
            }
            self.emit_comparison(op, Width::U64);
            return Ok(self.store.int());
        }

        // Ordinary arithmetic: resolve the common type, cast both operands
        // to it, then select the opcode by (family, width).
        let common = if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            if lt.is_integral() {
                self.store.integer_promote(&lt)
            } else {
                self.sink.error(
                    DiagCode::NON_ARITHMETIC,
                    span,
                    format!("type '{lt}' is not an integer"),
                );
                self.store.int()
            }
        } else {
            self.store.arithmetic_convert(&lt, &rt, span, self.sink)
        };
        if op.is_integer_only() && (!lt.is_integral() || !rt.is_integral()) {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                span,
                format!("invalid operands '{lt}' and '{rt}'"),
            );
        }

        let et = self.emit_expr(left)?;
        self.emit_numeric_cast(&et, &common);
        let et = self.emit_expr(right)?;
        self.emit_numeric_cast(&et, &common);

        let w = self.width_of(&common).unwrap_or(Width::I32);
        if op.is_relational() {
            self.emit_comparison(op, w);
            return Ok(self.store.int());
        }
        let family = bin_family(op);
        match select_binary(family, w) {
            Some(sel) => self.emit(sel),
            None => {
                // Error recovery for integer-only ops at float widths: the
                // mismatch was already reported, keep the stack balanced.
                self.emit(Op::Drop);
            }
        }
        Ok(common)
    }

    /// Emit a comparison: `==`, `>`, `>=` are native opcodes; `!=`, `<=`,
    /// `<` are the complement plus `Not`.
    fn emit_comparison(&mut self, op: BinaryOp, w: Width) {
        let (family, invert) = match op {
            BinaryOp::Eq => (BinFamily::Eq, false),
            BinaryOp::Ne => (BinFamily::Eq, true),
            BinaryOp::Gt => (BinFamily::Gt, false),
            BinaryOp::Le => (BinFamily::Gt, true),
            BinaryOp::Ge => (BinFamily::Ge, false),
            BinaryOp::Lt => (BinFamily::Ge, true),
            _ => unreachable!("not a comparison"),
        };
        if let Some(sel) = select_binary(family, w) {
            self.emit(sel);
        }
        if invert {
            self.emit(Op::Not);
        }
    }

    fn emit_ternary(
        &mut self,
        cond: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        let tt = self.expr_type(then_expr);
        let ft = self.expr_type(else_expr);
        let common = self.ternary_type(&tt, &ft, span);

        let else_l = self.new_label();
        let end = self.new_label();
        self.emit_condition(cond)?;
        self.emit_branch_zero(else_l);
        let t = self.emit_expr(then_expr)?;
        self.emit_numeric_cast(&t, &common);
        self.emit_jump(end);
        self.bind(else_l);
        let t = self.emit_expr(else_expr)?;
        self.emit_numeric_cast(&t, &common);
        self.bind(end);
        Ok(common)
    }

    // ── Assignment ───────────────────────────────────────────────────────

    fn emit_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        let Some(place) = self.emit_place(target)? else {
            // Not an lvalue (already reported): evaluate for effects.
            let vt = self.emit_expr(value)?;
            for _ in 0..vt.slot_count() {
                self.emit(Op::Drop);
            }
            self.emit_const(Value::ZERO);
            return Ok(self.store.int());
        };
        let ty = place.ty().clone();

        match op {
            None => self.emit_plain_assign(place, ty, value, span),
            Some(binop) => self.emit_compound_assign(place, ty, binop, value, span),
        }
    }

    fn emit_plain_assign(
        &mut self,
        place: Place,
        ty: Arc<Type>,
        value: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        let slots = ty.slot_count();
        let vt = self.emit_expr(value)?;
        self.emit_implicit_cast(&vt, &ty, span);

        match &place {
            Place::Global { offset, .. } => {
                if slots == 1 {
                    self.emit(Op::Dup);
                    self.emit(Op::StoreGlobal(*offset));
                } else {
                    for i in (0..slots).rev() {
                        self.emit(Op::StoreGlobal(offset + i));
                    }
                    for i in 0..slots {
                        self.emit(Op::LoadGlobal(offset + i));
                    }
                }
            }
            Place::Frame { offset, .. } => {
                if slots == 1 {
                    self.emit(Op::Dup);
                    self.emit(Op::StoreFrame(*offset));
                } else {
                    for i in (0..slots).rev() {
                        self.emit(Op::StoreFrame(offset + i as i32));
                    }
                    for i in 0..slots {
                        self.emit(Op::LoadFrame(offset + i as i32));
                    }
                }
            }
            Place::Indirect { .. } => {
                if slots == 1 {
                    let tmp = self.alloc_temp();
                    self.emit(Op::StoreFrame(tmp));
                    self.emit(Op::LoadFrame(tmp));
                    self.emit_store_scalar(&place);
                    self.emit(Op::LoadFrame(tmp));
                } else {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("cannot store aggregate '{ty}' through a pointer"),
                    );
                    for _ in 0..slots {
                        self.emit(Op::Drop);
                    }
                    self.emit(Op::Drop); // the address
                    for _ in 0..slots {
                        self.emit_const(Value::ZERO);
                    }
                }
            }
        }
        Ok(ty)
    }

    fn emit_compound_assign(
        &mut self,
        place: Place,
        ty: Arc<Type>,
        op: BinaryOp,
        value: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        if ty.slot_count() != 1 {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                span,
                format!("compound assignment needs a scalar target, got '{ty}'"),
            );
            if matches!(place, Place::Indirect { .. }) {
                self.emit(Op::Drop);
            }
            let vt = self.emit_expr(value)?;
            for _ in 0..vt.slot_count() {
                self.emit(Op::Drop);
            }
            self.emit_const(Value::ZERO);
            return Ok(ty);
        }

        // p += n / p -= n move by elements, not by an arithmetic op.
        if ty.is_pointer() && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            return self.emit_pointer_compound(place, ty, op, value, span);
        }

        let vt = self.expr_type(value);
        let common = self.store.arithmetic_convert(&ty, &vt, span, self.sink);

        match &place {
            Place::Global { offset, .. } => {
                self.emit(Op::LoadGlobal(*offset));
                self.finish_compound(&ty, &common, op, value, span)?;
                self.emit(Op::Dup);
                self.emit(Op::StoreGlobal(*offset));
            }
            Place::Frame { offset, .. } => {
                self.emit(Op::LoadFrame(*offset));
                self.finish_compound(&ty, &common, op, value, span)?;
                self.emit(Op::Dup);
                self.emit(Op::StoreFrame(*offset));
            }
            Place::Indirect { .. } => {
                let tmp_addr = self.alloc_temp();
                let tmp_val = self.alloc_temp();
                self.emit(Op::StoreFrame(tmp_addr));
                self.emit(Op::LoadFrame(tmp_addr));
                let w = self.width_of(&ty).unwrap_or(Width::U64);
                self.emit(Op::LoadInd(w));
                self.finish_compound(&ty, &common, op, value, span)?;
                self.emit(Op::StoreFrame(tmp_val));
                self.emit(Op::LoadFrame(tmp_addr));
                self.emit(Op::LoadFrame(tmp_val));
                self.emit(Op::StoreInd(w));
                self.emit(Op::LoadFrame(tmp_val));
            }
        }
        Ok(ty)
    }

    /// With the current value on the stack: cast to the common type, emit
    /// the right operand, apply the operator, cast back to the target type.
    fn finish_compound(
        &mut self,
        ty: &Arc<Type>,
        common: &Arc<Type>,
        op: BinaryOp,
        value: &Expr,
        span: Span,
    ) -> EmitResult<()> {
        self.emit_numeric_cast(ty, common);
        let vt = self.emit_expr(value)?;
        self.emit_numeric_cast(&vt, common);
        let w = self.width_of(common).unwrap_or(Width::I32);
        if op.is_integer_only() && !common.is_integral() {
            self.sink.error(
                DiagCode::TYPE_MISMATCH,
                span,
                format!("invalid operands for compound assignment on '{common}'"),
            );
        }
        match select_binary(bin_family(op), w) {
            Some(sel) => self.emit(sel),
            None => self.emit(Op::Drop),
        }
        self.emit_numeric_cast(common, ty);
        Ok(())
    }

    fn emit_pointer_compound(
        &mut self,
        place: Place,
        ty: Arc<Type>,
        op: BinaryOp,
        value: &Expr,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        let elem_slots = pointer_elem_slots(&ty);
        let advance = |this: &mut Self, value: &Expr| -> EmitResult<()> {
            let it = this.emit_expr(value)?;
            this.emit_index_offset(&it, span);
            if matches!(op, BinaryOp::Sub) {
                this.emit(Op::Neg(Width::I64));
            }
            this.emit(Op::PtrAdd(elem_slots));
            Ok(())
        };
        match &place {
            Place::Global { offset, .. } => {
                self.emit(Op::LoadGlobal(*offset));
                advance(self, value)?;
                self.emit(Op::Dup);
                self.emit(Op::StoreGlobal(*offset));
            }
            Place::Frame { offset, .. } => {
                self.emit(Op::LoadFrame(*offset));
                advance(self, value)?;
                self.emit(Op::Dup);
                self.emit(Op::StoreFrame(*offset));
            }
            Place::Indirect { .. } => {
                let tmp_addr = self.alloc_temp();
                let tmp_val = self.alloc_temp();
                self.emit(Op::StoreFrame(tmp_addr));
                self.emit(Op::LoadFrame(tmp_addr));
                self.emit(Op::LoadInd(Width::U64));
                advance(self, value)?;
                self.emit(Op::StoreFrame(tmp_val));
                self.emit(Op::LoadFrame(tmp_addr));
                self.emit(Op::LoadFrame(tmp_val));
                self.emit(Op::StoreInd(Width::U64));
                self.emit(Op::LoadFrame(tmp_val));
            }
        }
        Ok(ty)
    }

    fn emit_incdec(
        &mut self,
        operand: &Expr,
        delta: i64,
        post: bool,
        span: Span,
    ) -> EmitResult<Arc<Type>> {
        let Some(place) = self.emit_place(operand)? else {
            self.emit_const(Value::ZERO);
            return Ok(self.store.int());
        };
        let ty = place.ty().clone();
        if ty.slot_count() != 1 || !(ty.is_arithmetic() || ty.is_pointer()) {
            self.sink.error(
                DiagCode::NON_ARITHMETIC,
                span,
                format!("cannot increment type '{ty}'"),
            );
            if matches!(place, Place::Indirect { .. }) {
                self.emit(Op::Drop);
            }
            self.emit_const(Value::ZERO);
            return Ok(self.store.int());
        }

        let step = |this: &mut Self| {
            if ty.is_pointer() {
                this.emit_const(Value::from_i64(delta));
                this.emit(Op::PtrAdd(pointer_elem_slots(&ty)));
            } else {
                let w = this.width_of(&ty).unwrap_or(Width::I32);
                this.emit_const(const_one(w, delta));
                this.emit(Op::Add(w));
            }
        };

        match &place {
            Place::Global { .. } | Place::Frame { .. } => {
                let loaded = self.emit_load(place.clone());
                debug_assert_eq!(loaded, ty);
                if post {
                    self.emit(Op::Dup);
                    step(self);
                    self.emit_store_scalar(&place);
                } else {
                    step(self);
                    self.emit(Op::Dup);
                    self.emit_store_scalar(&place);
                }
            }
            Place::Indirect { .. } => {
                let tmp_addr = self.alloc_temp();
                let tmp_val = self.alloc_temp();
                let w = self.width_of(&ty).unwrap_or(Width::U64);
                self.emit(Op::StoreFrame(tmp_addr));
                self.emit(Op::LoadFrame(tmp_addr));
                self.emit(Op::LoadInd(w));
                if post {
                    self.emit(Op::Dup);
                    step(self);
                    self.emit(Op::StoreFrame(tmp_val));
                    self.emit(Op::LoadFrame(tmp_addr));
                    self.emit(Op::LoadFrame(tmp_val));
                    self.emit(Op::StoreInd(w));
                } else {
                    step(self);
                    self.emit(Op::StoreFrame(tmp_val));
                    self.emit(Op::LoadFrame(tmp_addr));
                    self.emit(Op::LoadFrame(tmp_val));
                    self.emit(Op::StoreInd(w));
                    self.emit(Op::LoadFrame(tmp_val));
                }
            }
        }
        Ok(ty)
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn emit_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> EmitResult<Arc<Type>> {
        let arg_types: Vec<_> = args.iter().map(|a| self.expr_type(a)).collect();

        match &callee.kind {
            ExprKind::Ident(_) => {
                let Some(idx) = self.callee_target(callee, &arg_types, span) else {
                    return self.emit_discarded_args(args);
                };
                self.emit_args_and_call(idx, args)
            }
            ExprKind::Member { base, member, arrow } => {
                let Some(idx) =
                    self.resolve_method(base, &member.name, *arrow, &arg_types, span)
                else {
                    return self.emit_discarded_args(args);
                };
                let f = &self.functions[idx as usize];
                let is_host = matches!(f.kind, FunctionKind::Host { .. });
                if !is_host {
                    // Script methods take the receiver address as `this`.
                    if *arrow {
                        self.emit_expr(base)?;
                    } else {
                        match self.emit_place(base)? {
                            Some(Place::Global { offset, .. }) => {
                                self.emit(Op::GlobalAddr(offset))
                            }
                            Some(Place::Frame { offset, .. }) => {
                                self.emit(Op::FrameAddr(offset))
                            }
                            Some(Place::Indirect { .. }) => {}
                            None => self.emit_const(Value::ZERO),
                        }
                    }
                }
                self.emit_args_and_call(idx, args)
            }
            _ => {
                let t = self.emit_expr(callee)?;
                self.sink.error(
                    DiagCode::NOT_CALLABLE,
                    span,
                    format!("type '{t}' is not callable"),
                );
                for _ in 0..t.slot_count() {
                    self.emit(Op::Drop);
                }
                self.emit_discarded_args(args)
            }
        }
    }

    /// Resolve an unqualified callee to a function-table index.
    fn callee_target(
        &mut self,
        callee: &Expr,
        arg_types: &[Arc<Type>],
        span: Span,
    ) -> Option<u32> {
        match &callee.kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                self.resolve_overload(None, &name, arg_types, span)
            }
            _ => None,
        }
    }

    fn resolve_method(
        &mut self,
        base: &Expr,
        method: &str,
        arrow: bool,
        arg_types: &[Arc<Type>],
        span: Span,
    ) -> Option<u32> {
        let bt = if arrow {
            let pt = self.expr_type(base);
            match &*pt {
                Type::Pointer(inner) => inner.clone(),
                _ => {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("'->' applied to non-pointer type '{pt}'"),
                    );
                    return None;
                }
            }
        } else {
            self.undecayed_type(base)
        };
        let Type::Struct(def) = &*bt else {
            self.sink.error(
                DiagCode::UNKNOWN_MEMBER,
                span,
                format!("type '{bt}' has no methods"),
            );
            return None;
        };
        let qualifier = def.name.clone();
        self.resolve_overload(Some(&qualifier), method, arg_types, span)
    }

    /// Rank candidates by summed cast score over the argument/parameter
    /// pairs. Zero on any pair disqualifies a candidate; a tie at the top
    /// is ambiguous.
    pub(crate) fn resolve_overload(
        &mut self,
        qualifier: Option<&str>,
        name: &str,
        arg_types: &[Arc<Type>],
        span: Span,
    ) -> Option<u32> {
        let mut candidates: Vec<(u32, u32)> = Vec::new();
        let mut name_seen = false;
        for (i, f) in self.functions.iter().enumerate() {
            if f.name != name || f.qualifier.as_deref() != qualifier {
                continue;
            }
            name_seen = true;
            let params = &f.sig.params;
            if arg_types.len() > params.len()
                || params[arg_types.len()..].iter().any(|p| p.default.is_none())
            {
                continue;
            }
            let mut total = 0u32;
            let mut viable = true;
            for (at, p) in arg_types.iter().zip(params.iter()) {
                let s = self.store.score_cast(at, &p.ty);
                if s == 0 {
                    viable = false;
                    break;
                }
                total += s;
            }
            if viable {
                candidates.push((i as u32, total));
            }
        }

        if candidates.is_empty() {
            let (code, what) = if !name_seen {
                if qualifier.is_some() {
                    (DiagCode::UNKNOWN_MEMBER, "method")
                } else {
                    (DiagCode::UNDEFINED_SYMBOL, "function")
                }
            } else {
                (DiagCode::NO_MATCHING_OVERLOAD, "overload of")
            };
            self.sink.error(
                code,
                span,
                format!("no matching {what} '{name}' for the given arguments"),
            );
            return None;
        }
        let best = candidates.iter().map(|&(_, s)| s).max().unwrap();
        let top: Vec<_> = candidates.iter().filter(|&&(_, s)| s == best).collect();
        if top.len() > 1 {
            self.sink.error(
                DiagCode::AMBIGUOUS_CALL,
                span,
                format!("call of '{name}' is ambiguous"),
            );
        }
        Some(top[0].0)
    }

    /// Emit arguments cast to the parameter types, fill trailing defaults,
    /// and emit the call itself.
    fn emit_args_and_call(&mut self, idx: u32, args: &[Expr]) -> EmitResult<Arc<Type>> {
        let f = &self.functions[idx as usize];
        let sig = f.sig.clone();
        let kind = f.kind;

        for (arg, p) in args.iter().zip(sig.params.iter()) {
            let at = self.emit_expr(arg)?;
            self.emit_implicit_cast(&at, &p.ty, arg.span);
        }
        for p in &sig.params[args.len()..] {
            let w = self.width_of(&p.ty).unwrap_or(Width::I32);
            let v = match p.default {
                Some(cobble_types::DefaultArg::Int(x)) => {
                    cobble_bytecode::apply_conv(Width::I64, w, Value::from_i64(x))
                }
                Some(cobble_types::DefaultArg::Float(x)) => {
                    cobble_bytecode::apply_conv(Width::F64, w, Value::from_f64(x))
                }
                None => unreachable!("overload resolution checked defaults"),
            };
            self.emit_const(v);
        }

        match kind {
            FunctionKind::Host { binding } => self.emit(Op::CallHost(binding)),
            _ => self.emit(Op::Call(idx)),
        }
        Ok(sig.ret.clone())
    }

    /// A call that failed to resolve: evaluate arguments for their side
    /// effects, discard them, and produce an int fallback.
    fn emit_discarded_args(&mut self, args: &[Expr]) -> EmitResult<Arc<Type>> {
        for arg in args {
            let t = self.emit_expr(arg)?;
            for _ in 0..t.slot_count() {
                self.emit(Op::Drop);
            }
        }
        self.emit_const(Value::ZERO);
        Ok(self.store.int())
    }
}

fn bin_family(op: BinaryOp) -> BinFamily {
    match op {
        BinaryOp::Add => BinFamily::Add,
        BinaryOp::Sub => BinFamily::Sub,
        BinaryOp::Mul => BinFamily::Mul,
        BinaryOp::Div => BinFamily::Div,
        BinaryOp::Rem => BinFamily::Rem,
        BinaryOp::BitAnd => BinFamily::BitAnd,
        BinaryOp::BitOr => BinFamily::BitOr,
        BinaryOp::BitXor => BinFamily::BitXor,
        BinaryOp::Shl => BinFamily::Shl,
        BinaryOp::Shr => BinFamily::Shr,
        _ => unreachable!("not an arithmetic family"),
    }
}

fn pointer_elem_slots(ty: &Type) -> u32 {
    match ty {
        Type::Pointer(inner) => inner.slot_count().max(1),
        _ => 1,
    }
}

/// The additive step constant at a given width.
fn const_one(w: Width, delta: i64) -> Value {
    match w {
        Width::F32 => Value::from_f32(delta as f32),
        Width::F64 => Value::from_f64(delta as f64),
        _ => cobble_bytecode::apply_conv(Width::I64, w, Value::from_i64(delta)),
    }
}
