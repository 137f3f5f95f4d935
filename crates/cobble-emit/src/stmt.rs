//! Statement code generation.
//!
//! Statements leave the stack balanced: expression statements drop their
//! value, control-flow constructs route through two-phase labels, and
//! loops and switches push a break/continue context for the duration of
//! their bodies.

use crate::context::{Emitter, Label, LoopCtx, ScopeKind};
use crate::error::EmitResult;
use crate::expr::Place;
use cobble_bytecode::{Op, Value, Width};
use cobble_types::ast::{
    ArraySuffix, DoWhileStmt, Expr, ExprKind, ForStmt, IfStmt, ReturnStmt, Stmt, SwitchStmt,
    VarDecl, WhileStmt,
};
use cobble_types::{DiagCode, Span, Type};
use std::sync::Arc;

impl Emitter<'_> {
    pub(crate) fn emit_stmts(&mut self, stmts: &[Stmt]) -> EmitResult<()> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn emit_stmt(&mut self, stmt: &Stmt) -> EmitResult<()> {
        match stmt {
            Stmt::Block(block) => {
                self.push_scope(ScopeKind::Block);
                let r = self.emit_stmts(&block.stmts);
                self.pop_scope();
                r
            }
            Stmt::Var(decl) => self.emit_local_decl(decl),
            Stmt::Expr(expr) => self.emit_expr_stmt(expr),
            Stmt::If(s) => self.emit_if(s),
            Stmt::While(s) => self.emit_while(s),
            Stmt::DoWhile(s) => self.emit_do_while(s),
            Stmt::For(s) => self.emit_for(s),
            Stmt::Switch(s) => self.emit_switch(s),
            Stmt::Break(span) => {
                self.emit_break(*span);
                Ok(())
            }
            Stmt::Continue(span) => {
                self.emit_continue(*span);
                Ok(())
            }
            Stmt::Return(s) => self.emit_return(s),
            Stmt::Empty(_) => Ok(()),
        }
    }

    fn emit_expr_stmt(&mut self, expr: &Expr) -> EmitResult<()> {
        let ty = self.emit_expr(expr)?;
        for _ in 0..ty.slot_count() {
            self.emit(Op::Drop);
        }
        Ok(())
    }

    // ── Declarations ─────────────────────────────────────────────────────

    /// Resolve a declarator's full type, applying the array suffix.
    pub(crate) fn declarator_type(
        &mut self,
        base: &Arc<Type>,
        array: &ArraySuffix,
        span: Span,
    ) -> Arc<Type> {
        match array {
            ArraySuffix::None => base.clone(),
            ArraySuffix::Unsized => Arc::new(Type::Array {
                elem: base.clone(),
                len: None,
            }),
            ArraySuffix::Sized(len_expr) => {
                let len = match self.eval_const(len_expr) {
                    Some((v, _)) => v.as_i64().max(0) as u32,
                    None => {
                        self.sink.error(
                            DiagCode::NONCONSTANT_CASE,
                            span,
                            "array length is not a constant expression",
                        );
                        1
                    }
                };
                Arc::new(Type::Array {
                    elem: base.clone(),
                    len: Some(len),
                })
            }
        }
    }

    fn emit_local_decl(&mut self, decl: &VarDecl) -> EmitResult<()> {
        let base = self.resolve_type_name(&decl.ty);
        let ty = self.declarator_type(&base, &decl.array, decl.span);
        let ty = complete_array_len(ty, decl.init.as_ref());
        if ty.is_void() {
            self.sink.error(
                DiagCode::VOID_VALUE,
                decl.span,
                format!("variable '{}' declared void", decl.name.name),
            );
        }
        let offset = self.define_local(&decl.name.name, ty.clone(), decl.name.span);
        // Locals start zeroed by the frame setup; only initializers emit.
        if let Some(init) = &decl.init {
            self.emit_initializer(Place::Frame { offset, ty }, init)?;
        }
        Ok(())
    }

    /// Emit an initializer into a direct place: a scalar expression, or a
    /// brace list filling array elements / struct fields in order.
    pub(crate) fn emit_initializer(&mut self, place: Place, init: &Expr) -> EmitResult<()> {
        let ty = place.ty().clone();
        if let ExprKind::InitList(items) = &init.kind {
            return self.emit_init_list(&place, &ty, items, init.span);
        }
        let vt = self.emit_expr(init)?;
        self.emit_implicit_cast(&vt, &ty, init.span);
        self.store_direct(&place, ty.slot_count());
        Ok(())
    }

    fn emit_init_list(
        &mut self,
        place: &Place,
        ty: &Arc<Type>,
        items: &[Expr],
        span: Span,
    ) -> EmitResult<()> {
        match &**ty {
            Type::Array { elem, len } => {
                let cap = len.unwrap_or(items.len() as u32);
                if items.len() as u32 > cap {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("too many initializers for '{ty}'"),
                    );
                }
                let elem_slots = elem.slot_count();
                for (i, item) in items.iter().take(cap as usize).enumerate() {
                    let sub = self.offset_place(place, i as u32 * elem_slots, elem.clone());
                    self.emit_initializer(sub, item)?;
                }
                Ok(())
            }
            Type::Struct(def) => {
                let fields: Vec<_> = def
                    .fields()
                    .map(|(_, fty, slot, _)| (fty.clone(), slot))
                    .collect();
                if items.len() > fields.len() {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        span,
                        format!("too many initializers for '{ty}'"),
                    );
                }
                for (item, (fty, slot)) in items.iter().zip(fields) {
                    let sub = self.offset_place(place, slot, fty);
                    self.emit_initializer(sub, item)?;
                }
                Ok(())
            }
            _ => {
                // A scalar wrapped in braces: `int x = {1};`
                match items {
                    [single] => self.emit_initializer(place.clone(), single),
                    _ => {
                        self.sink.error(
                            DiagCode::TYPE_MISMATCH,
                            span,
                            format!("invalid initializer list for '{ty}'"),
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    fn offset_place(&self, place: &Place, slots: u32, ty: Arc<Type>) -> Place {
        match place {
            Place::Global { offset, .. } => Place::Global {
                offset: offset + slots,
                ty,
            },
            Place::Frame { offset, .. } => Place::Frame {
                offset: offset + slots as i32,
                ty,
            },
            Place::Indirect { .. } => Place::Indirect { ty },
        }
    }

    /// Pop a value (its slots pushed lowest-first) into a direct place.
    fn store_direct(&mut self, place: &Place, slots: u32) {
        match place {
            Place::Global { offset, .. } => {
                for i in (0..slots).rev() {
                    self.emit(Op::StoreGlobal(offset + i));
                }
            }
            Place::Frame { offset, .. } => {
                for i in (0..slots).rev() {
                    self.emit(Op::StoreFrame(offset + i as i32));
                }
            }
            Place::Indirect { ty } => {
                let w = self.width_of(ty).unwrap_or(Width::U64);
                self.emit(Op::StoreInd(w));
            }
        }
    }

    // ── Control flow ─────────────────────────────────────────────────────

    fn emit_if(&mut self, s: &IfStmt) -> EmitResult<()> {
        let else_l = self.new_label();
        self.emit_condition(&s.cond)?;
        self.emit_branch_zero(else_l);
        self.emit_stmt(&s.then_branch)?;
        match &s.else_branch {
            Some(else_branch) => {
                let end = self.new_label();
                self.emit_jump(end);
                self.bind(else_l);
                self.emit_stmt(else_branch)?;
                self.bind(end);
            }
            None => self.bind(else_l),
        }
        Ok(())
    }

    fn emit_while(&mut self, s: &WhileStmt) -> EmitResult<()> {
        let start = self.new_label();
        let end = self.new_label();
        self.bind(start);
        self.emit_condition(&s.cond)?;
        self.emit_branch_zero(end);
        self.loops.push(LoopCtx {
            break_label: end,
            continue_label: Some(start),
        });
        let r = self.emit_stmt(&s.body);
        self.loops.pop();
        r?;
        self.emit_jump(start);
        self.bind(end);
        Ok(())
    }

    fn emit_do_while(&mut self, s: &DoWhileStmt) -> EmitResult<()> {
        let start = self.new_label();
        let cont = self.new_label();
        let end = self.new_label();
        self.bind(start);
        self.loops.push(LoopCtx {
            break_label: end,
            continue_label: Some(cont),
        });
        let r = self.emit_stmt(&s.body);
        self.loops.pop();
        r?;
        self.bind(cont);
        self.emit_condition(&s.cond)?;
        self.emit_branch_nonzero(start);
        self.bind(end);
        Ok(())
    }

    fn emit_for(&mut self, s: &ForStmt) -> EmitResult<()> {
        // The init clause's declarations live in their own scope.
        self.push_scope(ScopeKind::Block);
        let r = self.emit_for_inner(s);
        self.pop_scope();
        r
    }

    fn emit_for_inner(&mut self, s: &ForStmt) -> EmitResult<()> {
        if let Some(init) = &s.init {
            self.emit_stmt(init)?;
        }
        let test = self.new_label();
        let cont = self.new_label();
        let end = self.new_label();
        self.bind(test);
        if let Some(cond) = &s.cond {
            self.emit_condition(cond)?;
            self.emit_branch_zero(end);
        }
        self.loops.push(LoopCtx {
            break_label: end,
            continue_label: Some(cont),
        });
        let r = self.emit_stmt(&s.body);
        self.loops.pop();
        r?;
        self.bind(cont);
        if let Some(step) = &s.step {
            self.emit_expr_stmt(step)?;
        }
        self.emit_jump(test);
        self.bind(end);
        Ok(())
    }

    /// Switch lowering: evaluate the scrutinee once, duplicate-and-compare
    /// against each case value in declaration order (first match wins),
    /// then fall back to the default label or the end. Case bodies run in
    /// sequence — fallthrough is the default, `break` exits.
    fn emit_switch(&mut self, s: &SwitchStmt) -> EmitResult<()> {
        let st = {
            let raw = self.expr_type(&s.scrutinee);
            if raw.is_integral() {
                self.store.integer_promote(&raw)
            } else {
                self.sink.error(
                    DiagCode::TYPE_MISMATCH,
                    s.scrutinee.span,
                    format!("switch scrutinee has non-integer type '{raw}'"),
                );
                self.store.int()
            }
        };
        let w = self.width_of(&st).unwrap_or(Width::I32);

        let raw_ty = self.emit_expr(&s.scrutinee)?;
        self.emit_numeric_cast(&raw_ty, &st);

        // Fold case values up front; duplicates are diagnosed, a second
        // default is too.
        let end = self.new_label();
        let mut body_labels = Vec::with_capacity(s.cases.len());
        let mut default_label: Option<Label> = None;
        let mut seen_values: Vec<u64> = Vec::new();
        let mut dispatch: Vec<(Value, Label)> = Vec::new();

        for case in &s.cases {
            let label = self.new_label();
            body_labels.push(label);
            match &case.value {
                Some(value_expr) => {
                    let v = match self.eval_const(value_expr) {
                        Some((v, vty)) => {
                            let vw = self.width_of(&vty).unwrap_or(Width::I32);
                            cobble_bytecode::apply_conv(vw, w, v)
                        }
                        None => {
                            self.sink.error(
                                DiagCode::NONCONSTANT_CASE,
                                value_expr.span,
                                "case value is not a constant expression",
                            );
                            Value::ZERO
                        }
                    };
                    if seen_values.contains(&v.raw()) {
                        self.sink.error(
                            DiagCode::DUPLICATE_CASE,
                            case.span,
                            "duplicate case value",
                        );
                    }
                    seen_values.push(v.raw());
                    dispatch.push((v, label));
                }
                None => {
                    if default_label.is_some() {
                        self.sink.error(
                            DiagCode::DUPLICATE_DEFAULT,
                            case.span,
                            "multiple default cases",
                        );
                    } else {
                        default_label = Some(label);
                    }
                }
            }
        }

        // Dispatch chain.
        for (v, label) in &dispatch {
            let next = self.new_label();
            self.emit(Op::Dup);
            self.emit_const(*v);
            self.emit(Op::Eq(w));
            self.emit_branch_zero(next);
            self.emit(Op::Drop);
            self.emit_jump(*label);
            self.bind(next);
        }
        self.emit(Op::Drop);
        match default_label {
            Some(label) => self.emit_jump(label),
            None => self.emit_jump(end),
        }

        // Bodies in declaration order, no automatic break.
        self.loops.push(LoopCtx {
            break_label: end,
            continue_label: None,
        });
        let mut result = Ok(());
        for (case, label) in s.cases.iter().zip(body_labels.iter()) {
            self.bind(*label);
            if let Err(e) = self.emit_stmts(&case.body) {
                result = Err(e);
                break;
            }
        }
        self.loops.pop();
        result?;
        self.bind(end);
        Ok(())
    }

    fn emit_break(&mut self, span: Span) {
        match self.loops.last() {
            Some(ctx) => {
                let label = ctx.break_label;
                self.emit_jump(label);
            }
            None => self.sink.error(
                DiagCode::BREAK_OUTSIDE_LOOP,
                span,
                "'break' outside of a loop or switch",
            ),
        }
    }

    fn emit_continue(&mut self, span: Span) {
        // `continue` skips switch contexts and binds the innermost loop.
        let target = self
            .loops
            .iter()
            .rev()
            .find_map(|ctx| ctx.continue_label);
        match target {
            Some(label) => self.emit_jump(label),
            None => self.sink.error(
                DiagCode::CONTINUE_OUTSIDE_LOOP,
                span,
                "'continue' outside of a loop",
            ),
        }
    }

    fn emit_return(&mut self, s: &ReturnStmt) -> EmitResult<()> {
        let ret = self.current_ret.clone();
        let slots = ret.slot_count();
        match &s.value {
            Some(value) => {
                let vt = self.emit_expr(value)?;
                if ret.is_void() {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        s.span,
                        "void function returns a value",
                    );
                    for _ in 0..vt.slot_count() {
                        self.emit(Op::Drop);
                    }
                } else {
                    self.emit_implicit_cast(&vt, &ret, value.span);
                }
            }
            None => {
                if !ret.is_void() {
                    self.sink.error(
                        DiagCode::TYPE_MISMATCH,
                        s.span,
                        format!("function returning '{ret}' returns no value"),
                    );
                    for _ in 0..slots {
                        self.emit_const(Value::ZERO);
                    }
                }
            }
        }
        self.emit(Op::Return { value_slots: slots });
        Ok(())
    }
}

/// An unsized array declarator with a brace initializer takes its length
/// from the initializer: `int a[] = {1, 2, 3}` is three elements.
pub(crate) fn complete_array_len(ty: Arc<Type>, init: Option<&Expr>) -> Arc<Type> {
    if let Type::Array { elem, len: None } = &*ty {
        if let Some(Expr {
            kind: ExprKind::InitList(items),
            ..
        }) = init
        {
            return Arc::new(Type::Array {
                elem: elem.clone(),
                len: Some(items.len() as u32),
            });
        }
    }
    ty
}
