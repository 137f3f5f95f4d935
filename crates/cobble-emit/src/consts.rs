//! Compile-time evaluation of integral constant expressions.
//!
//! Folding covers integer literals, character literals, enumerator names,
//! `sizeof`, integral casts, and unary/binary/relational operators whose
//! operands fold. Everything is computed through the shared bytecode
//! kernels at the arithmetic-converted width, so a folded result carries
//! the exact bit pattern runtime evaluation would produce.
//!
//! Floating-point expressions are never folded; they lower to runtime
//! code. Division by a folded zero also defers to runtime.

use crate::context::Emitter;
use cobble_bytecode::{apply_binary, apply_conv, apply_unary, BinFamily, UnFamily, Value, Width};
use cobble_types::ast::{BinaryOp, Expr, ExprKind, IntSuffix, UnaryOp};
use cobble_types::{IntWidth, Type};
use std::sync::Arc;

impl Emitter<'_> {
    /// The runtime width class of a type, if it has one.
    pub(crate) fn width_of(&self, ty: &Type) -> Option<Width> {
        Width::of(ty, self.store.target())
    }

    /// Fold an integral constant expression to its value and type, or
    /// `None` when runtime code generation is required.
    pub(crate) fn eval_const(&mut self, e: &Expr) -> Option<(Value, Arc<Type>)> {
        match &e.kind {
            ExprKind::IntLit { value, suffix } => {
                let ty = self.int_lit_type(*value, *suffix);
                Some((self.canon(*value, &ty), ty))
            }
            ExprKind::CharLit(c) => {
                let ty = self.store.char_();
                Some((Value::from_i8(*c as i8), ty))
            }
            ExprKind::Ident(name) => {
                let (value, ty) = self.enum_consts.get(name)?.clone();
                Some((self.canon(value, &ty), ty))
            }
            ExprKind::SizeOfType(tn) => {
                let ty = self.resolve_type_name(tn);
                let size = self.store.byte_size_or_int(&ty, e.span, self.sink);
                let size_ty = self.store.make_int(false, IntWidth::Long);
                Some((Value::from_u64(size as u64), size_ty))
            }
            ExprKind::SizeOfExpr(inner) => {
                let ty = self.undecayed_type(inner);
                let size = self.store.byte_size_or_int(&ty, e.span, self.sink);
                let size_ty = self.store.make_int(false, IntWidth::Long);
                Some((Value::from_u64(size as u64), size_ty))
            }
            ExprKind::Unary { op, operand } => self.fold_unary(*op, operand),
            ExprKind::Binary { op, left, right } => self.fold_binary(*op, left, right, e),
            ExprKind::Cast { ty, expr } => {
                let (v, from_ty) = self.eval_const(expr)?;
                let to_ty = self.resolve_type_name(ty);
                if matches!(&*to_ty, Type::Bool) {
                    return Some((Value::from_bool(v.is_truthy()), to_ty));
                }
                if !to_ty.is_integral() {
                    return None;
                }
                let wf = self.width_of(&from_ty)?;
                let wt = self.width_of(&to_ty)?;
                Some((apply_conv(wf, wt, v), to_ty))
            }
            _ => None,
        }
    }

    fn fold_unary(&mut self, op: UnaryOp, operand: &Expr) -> Option<(Value, Arc<Type>)> {
        let (v, ty) = self.eval_const(operand)?;
        if !ty.is_integral() {
            return None;
        }
        match op {
            UnaryOp::Not => Some((Value::from_bool(!v.is_truthy()), self.store.int())),
            UnaryOp::Neg | UnaryOp::BitNot | UnaryOp::Plus => {
                let pty = self.store.integer_promote(&ty);
                let w = self.width_of(&pty)?;
                let pv = apply_conv(self.width_of(&ty)?, w, v);
                let out = match op {
                    UnaryOp::Neg => apply_unary(UnFamily::Neg, w, pv).ok()?,
                    UnaryOp::BitNot => apply_unary(UnFamily::BitNot, w, pv).ok()?,
                    _ => pv,
                };
                Some((out, pty))
            }
            _ => None,
        }
    }

    fn fold_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        whole: &Expr,
    ) -> Option<(Value, Arc<Type>)> {
        // Logical operators fold with short-circuit semantics: a false
        // (true) left operand decides `&&` (`||`) without the right one.
        if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
            let (lv, lty) = self.eval_const(left)?;
            if !lty.is_integral() {
                return None;
            }
            let decided = match op {
                BinaryOp::LogicalAnd => !lv.is_truthy(),
                _ => lv.is_truthy(),
            };
            if decided {
                let result = matches!(op, BinaryOp::LogicalOr);
                return Some((Value::from_bool(result), self.store.int()));
            }
            let (rv, rty) = self.eval_const(right)?;
            if !rty.is_integral() {
                return None;
            }
            return Some((Value::from_bool(rv.is_truthy()), self.store.int()));
        }

        let (lv, lty) = self.eval_const(left)?;
        let (rv, rty) = self.eval_const(right)?;
        if !lty.is_integral() || !rty.is_integral() {
            return None;
        }

        // Shifts take the promoted left operand's type; everything else
        // uses the usual arithmetic conversions.
        let common = if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            self.store.integer_promote(&lty)
        } else {
            self.store
                .arithmetic_convert(&lty, &rty, whole.span, self.sink)
        };
        let w = self.width_of(&common)?;
        let lc = apply_conv(self.width_of(&lty)?, w, lv);
        let rc = apply_conv(self.width_of(&rty)?, w, rv);

        let (family, invert) = match op {
            BinaryOp::Add => (BinFamily::Add, false),
            BinaryOp::Sub => (BinFamily::Sub, false),
            BinaryOp::Mul => (BinFamily::Mul, false),
            BinaryOp::Div => (BinFamily::Div, false),
            BinaryOp::Rem => (BinFamily::Rem, false),
            BinaryOp::BitAnd => (BinFamily::BitAnd, false),
            BinaryOp::BitOr => (BinFamily::BitOr, false),
            BinaryOp::BitXor => (BinFamily::BitXor, false),
            BinaryOp::Shl => (BinFamily::Shl, false),
            BinaryOp::Shr => (BinFamily::Shr, false),
            BinaryOp::Eq => (BinFamily::Eq, false),
            BinaryOp::Ne => (BinFamily::Eq, true),
            BinaryOp::Gt => (BinFamily::Gt, false),
            BinaryOp::Le => (BinFamily::Gt, true),
            BinaryOp::Ge => (BinFamily::Ge, false),
            BinaryOp::Lt => (BinFamily::Ge, true),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
        };

        // A zero divisor defers to runtime, where it faults.
        let raw = apply_binary(family, w, lc, rc).ok()?;
        if op.is_relational() {
            let v = if invert {
                Value::from_bool(!raw.is_truthy())
            } else {
                raw
            };
            Some((v, self.store.int()))
        } else {
            Some((raw, common))
        }
    }

    /// The type of an unsuffixed or suffixed integer literal.
    pub(crate) fn int_lit_type(&self, value: i64, suffix: IntSuffix) -> Arc<Type> {
        match suffix {
            IntSuffix::None => {
                if i32::try_from(value).is_ok() {
                    self.store.int()
                } else {
                    self.store.make_int(true, IntWidth::LongLong)
                }
            }
            IntSuffix::U => {
                if value >= 0 && value <= u32::MAX as i64 {
                    self.store.uint()
                } else {
                    self.store.make_int(false, IntWidth::LongLong)
                }
            }
            IntSuffix::L => self.store.make_int(true, IntWidth::Long),
            IntSuffix::UL => self.store.make_int(false, IntWidth::Long),
            IntSuffix::LL => self.store.make_int(true, IntWidth::LongLong),
            IntSuffix::ULL => self.store.make_int(false, IntWidth::LongLong),
        }
    }

    /// Canonicalize a literal's bits at its type's width.
    fn canon(&self, value: i64, ty: &Type) -> Value {
        match self.width_of(ty) {
            Some(w) => apply_conv(Width::I64, w, Value::from_i64(value)),
            None => Value::from_i64(value),
        }
    }
}
