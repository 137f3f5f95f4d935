//! The semantic type system.
//!
//! [`Type`] is the closed variant set every compilation stage agrees on.
//! It is distinct from [`crate::ast::TypeName`], which is the syntactic
//! form produced by the parser collaborator. A [`TypeStore`] is created per
//! compilation session on top of one [`TargetDesc`] and owns the
//! hash-consing pointer cache plus the C-style conversion rules: integer
//! promotion, usual arithmetic conversions, and cast scoring.
//!
//! Equality and hashing are structural for primitives, pointers, arrays,
//! and function signatures, and nominal (by name) for structs and enums —
//! the nominal cut keeps recursive struct-via-pointer types finite.

use crate::diag::{DiagCode, DiagnosticSink};
use crate::span::Span;
use crate::target::TargetDesc;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Width classes
// ══════════════════════════════════════════════════════════════════════════════

/// Integer width class. Resolved to a byte count against a [`TargetDesc`],
/// never stored as an absolute size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

impl IntWidth {
    /// Resolve this width class to a byte count for the given target.
    pub fn byte_size(self, target: &TargetDesc) -> u32 {
        match self {
            IntWidth::Char => target.char_size,
            IntWidth::Short => target.short_size,
            IntWidth::Int => target.int_size,
            IntWidth::Long => target.long_size,
            IntWidth::LongLong => target.long_long_size,
        }
    }

    /// C conversion rank ordering (char < short < int < long < long long).
    pub fn rank(self) -> u8 {
        match self {
            IntWidth::Char => 0,
            IntWidth::Short => 1,
            IntWidth::Int => 2,
            IntWidth::Long => 3,
            IntWidth::LongLong => 4,
        }
    }
}

/// Floating-point bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

// ══════════════════════════════════════════════════════════════════════════════
// Function signatures and aggregate definitions
// ══════════════════════════════════════════════════════════════════════════════

/// A compile-time default argument value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultArg {
    Int(i64),
    Float(f64),
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Arc<Type>,
    pub default: Option<DefaultArg>,
}

/// A function signature.
///
/// Instance methods carry `is_instance = true` and name their declaring
/// type in `qualifier`; the receiver is not part of `params`.
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub ret: Arc<Type>,
    pub params: Vec<Param>,
    pub is_instance: bool,
    pub qualifier: Option<String>,
}

impl FunctionSig {
    /// Structural signature comparison: return and parameter types plus the
    /// instance flag and qualifier. Parameter names and defaults are not
    /// part of a signature's identity.
    pub fn same_shape(&self, other: &FunctionSig) -> bool {
        self.ret == other.ret
            && self.is_instance == other.is_instance
            && self.qualifier == other.qualifier
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.ty == b.ty)
    }
}

/// A struct member: a field with computed offsets, or a method.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    Field {
        ty: Arc<Type>,
        /// Offset in value-stack slots from the start of the struct.
        slot_offset: u32,
        /// Offset in bytes for the target the struct was declared under.
        byte_offset: u32,
    },
    Method {
        sig: Arc<FunctionSig>,
    },
}

/// A struct definition: ordered fields and methods.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<Member>,
}

impl StructDef {
    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Ordered field members only.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Arc<Type>, u32, u32)> + '_ {
        self.members.iter().filter_map(|m| match &m.kind {
            MemberKind::Field {
                ty,
                slot_offset,
                byte_offset,
            } => Some((m.name.as_str(), ty, *slot_offset, *byte_offset)),
            MemberKind::Method { .. } => None,
        })
    }
}

/// An enum definition: ordered (name, value) members.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Type
// ══════════════════════════════════════════════════════════════════════════════

/// A semantic type.
#[derive(Debug, Clone)]
pub enum Type {
    /// Zero value-slots; has no byte size.
    Void,
    Bool,
    Int { signed: bool, width: IntWidth },
    Float(FloatWidth),
    Pointer(Arc<Type>),
    Array {
        elem: Arc<Type>,
        /// `None` for unsized arrays, which decay to pointer-like size.
        len: Option<u32>,
    },
    Function(Arc<FunctionSig>),
    Struct(Arc<StructDef>),
    Enum(Arc<EnumDef>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void) => true,
            (Type::Bool, Type::Bool) => true,
            (
                Type::Int { signed: s1, width: w1 },
                Type::Int { signed: s2, width: w2 },
            ) => s1 == s2 && w1 == w2,
            (Type::Float(a), Type::Float(b)) => a == b,
            (Type::Pointer(a), Type::Pointer(b)) => a == b,
            (
                Type::Array { elem: e1, len: l1 },
                Type::Array { elem: e2, len: l2 },
            ) => l1 == l2 && e1 == e2,
            (Type::Function(a), Type::Function(b)) => a.same_shape(b),
            // Nominal: structs and enums are identified by name.
            (Type::Struct(a), Type::Struct(b)) => a.name == b.name,
            (Type::Enum(a), Type::Enum(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Type::Void | Type::Bool => {}
            Type::Int { signed, width } => {
                signed.hash(state);
                width.hash(state);
            }
            Type::Float(w) => w.hash(state),
            Type::Pointer(inner) => inner.hash(state),
            Type::Array { elem, len } => {
                len.hash(state);
                elem.hash(state);
            }
            Type::Function(sig) => {
                sig.ret.hash(state);
                sig.is_instance.hash(state);
                sig.qualifier.hash(state);
                for p in &sig.params {
                    p.ty.hash(state);
                }
            }
            Type::Struct(def) => def.name.hash(state),
            Type::Enum(def) => def.name.hash(state),
        }
    }
}

impl Type {
    /// How many 8-byte value cells a value of this type occupies on the
    /// stack. Void occupies zero; an empty struct still occupies one.
    pub fn slot_count(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Bool
            | Type::Int { .. }
            | Type::Float(_)
            | Type::Pointer(_)
            | Type::Enum(_)
            | Type::Function(_) => 1,
            Type::Array { elem, len } => match len {
                Some(n) => n * elem.slot_count(),
                None => 1, // decays to a pointer
            },
            Type::Struct(def) => {
                let sum: u32 = def
                    .fields()
                    .map(|(_, ty, _, _)| ty.slot_count())
                    .sum();
                sum.max(1)
            }
        }
    }

    /// Byte size of this type under the given target, or `None` for Void.
    pub fn byte_size(&self, target: &TargetDesc) -> Option<u32> {
        match self {
            Type::Void => None,
            Type::Bool => Some(1),
            Type::Int { width, .. } => Some(width.byte_size(target)),
            Type::Float(FloatWidth::F32) => Some(target.float_size),
            Type::Float(FloatWidth::F64) => Some(target.double_size),
            Type::Pointer(_) | Type::Function(_) => Some(target.pointer_size),
            Type::Array { elem, len } => match len {
                Some(n) => elem.byte_size(target).map(|e| n * e),
                None => Some(target.pointer_size),
            },
            Type::Struct(def) => {
                let mut sum = 0;
                for (_, ty, _, _) in def.fields() {
                    sum += ty.byte_size(target)?;
                }
                Some(sum.max(1))
            }
            Type::Enum(_) => Some(target.int_size),
        }
    }

    /// True for the types the usual arithmetic conversions apply to.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int { .. } | Type::Float(_) | Type::Enum(_)
        )
    }

    /// True for integer-representable types (bool, integers, enums).
    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Bool | Type::Int { .. } | Type::Enum(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// True if a value of this type converts to a truth value.
    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || matches!(self, Type::Pointer(_) | Type::Array { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int { signed, width } => {
                if !*signed {
                    write!(f, "unsigned ")?;
                }
                match width {
                    IntWidth::Char => write!(f, "char"),
                    IntWidth::Short => write!(f, "short"),
                    IntWidth::Int => write!(f, "int"),
                    IntWidth::Long => write!(f, "long"),
                    IntWidth::LongLong => write!(f, "long long"),
                }
            }
            Type::Float(FloatWidth::F32) => write!(f, "float"),
            Type::Float(FloatWidth::F64) => write!(f, "double"),
            Type::Pointer(inner) => write!(f, "{}*", inner),
            Type::Array { elem, len } => match len {
                Some(n) => write!(f, "{}[{}]", elem, n),
                None => write!(f, "{}[]", elem),
            },
            Type::Function(sig) => {
                write!(f, "{}(", sig.ret)?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                write!(f, ")")
            }
            Type::Struct(def) => write!(f, "struct {}", def.name),
            Type::Enum(def) => write!(f, "enum {}", def.name),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// TypeStore
// ══════════════════════════════════════════════════════════════════════════════

/// Per-session type system: primitive singletons, the hash-consing pointer
/// cache, and the C-style conversion rules, all resolved against one
/// [`TargetDesc`].
///
/// One store per compilation; independent compilations each get their own.
pub struct TypeStore {
    target: TargetDesc,
    pointer_cache: RefCell<HashMap<Arc<Type>, Arc<Type>>>,
    void_ty: Arc<Type>,
    bool_ty: Arc<Type>,
    char_ty: Arc<Type>,
    int_ty: Arc<Type>,
    uint_ty: Arc<Type>,
    float_ty: Arc<Type>,
    double_ty: Arc<Type>,
}

impl TypeStore {
    /// Create a type store for one target.
    pub fn new(target: TargetDesc) -> Self {
        Self {
            target,
            pointer_cache: RefCell::new(HashMap::new()),
            void_ty: Arc::new(Type::Void),
            bool_ty: Arc::new(Type::Bool),
            char_ty: Arc::new(Type::Int {
                signed: true,
                width: IntWidth::Char,
            }),
            int_ty: Arc::new(Type::Int {
                signed: true,
                width: IntWidth::Int,
            }),
            uint_ty: Arc::new(Type::Int {
                signed: false,
                width: IntWidth::Int,
            }),
            float_ty: Arc::new(Type::Float(FloatWidth::F32)),
            double_ty: Arc::new(Type::Float(FloatWidth::F64)),
        }
    }

    /// The target this store resolves width classes against.
    pub fn target(&self) -> &TargetDesc {
        &self.target
    }

    pub fn void(&self) -> Arc<Type> {
        self.void_ty.clone()
    }

    pub fn bool_(&self) -> Arc<Type> {
        self.bool_ty.clone()
    }

    pub fn char_(&self) -> Arc<Type> {
        self.char_ty.clone()
    }

    pub fn int(&self) -> Arc<Type> {
        self.int_ty.clone()
    }

    pub fn uint(&self) -> Arc<Type> {
        self.uint_ty.clone()
    }

    pub fn float(&self) -> Arc<Type> {
        self.float_ty.clone()
    }

    pub fn double(&self) -> Arc<Type> {
        self.double_ty.clone()
    }

    /// Build an integer type from signedness and width class.
    pub fn make_int(&self, signed: bool, width: IntWidth) -> Arc<Type> {
        match (signed, width) {
            (true, IntWidth::Char) => self.char_(),
            (true, IntWidth::Int) => self.int(),
            (false, IntWidth::Int) => self.uint(),
            _ => Arc::new(Type::Int { signed, width }),
        }
    }

    /// Resolve a canonical primitive type name (`"int"`, `"unsigned long"`,
    /// `"double"`, ...). Multi-word names use single spaces.
    pub fn primitive(&self, name: &str) -> Option<Arc<Type>> {
        let ty = match name {
            "void" => self.void(),
            "bool" => self.bool_(),
            "char" | "signed char" => self.char_(),
            "unsigned char" => self.make_int(false, IntWidth::Char),
            "short" | "signed short" => self.make_int(true, IntWidth::Short),
            "unsigned short" => self.make_int(false, IntWidth::Short),
            "int" | "signed" | "signed int" => self.int(),
            "unsigned" | "unsigned int" => self.uint(),
            "long" | "signed long" => self.make_int(true, IntWidth::Long),
            "unsigned long" => self.make_int(false, IntWidth::Long),
            "long long" | "signed long long" => self.make_int(true, IntWidth::LongLong),
            "unsigned long long" => self.make_int(false, IntWidth::LongLong),
            "float" => self.float(),
            "double" => self.double(),
            _ => return None,
        };
        Some(ty)
    }

    /// The pointer type to `inner`, memoized so repeated lookups return the
    /// canonically equal (same-allocation) type.
    pub fn pointer_to(&self, inner: &Arc<Type>) -> Arc<Type> {
        let mut cache = self.pointer_cache.borrow_mut();
        if let Some(p) = cache.get(inner) {
            return p.clone();
        }
        let p = Arc::new(Type::Pointer(inner.clone()));
        cache.insert(inner.clone(), p.clone());
        p
    }

    /// Byte size, reporting `VOID_BYTE_SIZE` and falling back to the
    /// target's int size when the type has none, so emission can continue.
    pub fn byte_size_or_int(
        &self,
        ty: &Type,
        span: Span,
        sink: &mut DiagnosticSink,
    ) -> u32 {
        match ty.byte_size(&self.target) {
            Some(n) => n,
            None => {
                sink.error(
                    DiagCode::VOID_BYTE_SIZE,
                    span,
                    format!("type '{}' has no byte size", ty),
                );
                self.target.int_size
            }
        }
    }

    /// Integer promotion: bool, enum, and integer types of rank below
    /// `int` promote to `int` when it can represent every value of the
    /// source type, else to `unsigned int`. Everything else is unchanged.
    pub fn integer_promote(&self, ty: &Arc<Type>) -> Arc<Type> {
        match &**ty {
            Type::Bool | Type::Enum(_) => self.int(),
            Type::Int {
                signed,
                width: width @ (IntWidth::Char | IntWidth::Short),
            } => {
                if width.byte_size(&self.target) < self.target.int_size || *signed {
                    self.int()
                } else {
                    self.uint()
                }
            }
            _ => ty.clone(),
        }
    }

    /// Usual arithmetic conversions.
    ///
    /// `double` dominates, else `float`; otherwise both operands are
    /// integer-promoted and resolved by the classic ranking: same
    /// signedness → higher rank wins; mixed signedness → the unsigned
    /// operand wins at equal-or-higher rank, the signed operand wins only
    /// when strictly wider, else the unsigned version of the signed type.
    ///
    /// A non-arithmetic operand reports [`DiagCode::NON_ARITHMETIC`] and
    /// falls back to `int`.
    pub fn arithmetic_convert(
        &self,
        a: &Arc<Type>,
        b: &Arc<Type>,
        span: Span,
        sink: &mut DiagnosticSink,
    ) -> Arc<Type> {
        if !a.is_arithmetic() || !b.is_arithmetic() {
            let offender = if a.is_arithmetic() { b } else { a };
            sink.error(
                DiagCode::NON_ARITHMETIC,
                span,
                format!("type '{}' is not arithmetic", offender),
            );
            return self.int();
        }
        if matches!(&**a, Type::Float(FloatWidth::F64))
            || matches!(&**b, Type::Float(FloatWidth::F64))
        {
            return self.double();
        }
        if matches!(&**a, Type::Float(FloatWidth::F32))
            || matches!(&**b, Type::Float(FloatWidth::F32))
        {
            return self.float();
        }

        let pa = self.integer_promote(a);
        let pb = self.integer_promote(b);
        if pa == pb {
            return pa;
        }

        let (sa, wa) = int_parts(&pa);
        let (sb, wb) = int_parts(&pb);
        if sa == sb {
            return if wa.rank() >= wb.rank() { pa } else { pb };
        }
        // Mixed signedness: (u, s) = the unsigned and signed operands.
        let (u, uw, s, sw) = if sa { (pb, wb, pa, wa) } else { (pa, wa, pb, wb) };
        if uw.rank() >= sw.rank() {
            u
        } else if sw.byte_size(&self.target) > uw.byte_size(&self.target) {
            s
        } else {
            self.make_int(false, sw)
        }
    }

    /// Rank an implicit conversion from `from` to `to`.
    ///
    /// Contract: exact match 1000; matching pointer target (array decay,
    /// `void*` adaptation) 900; same-size integer 900; differing-size
    /// integer 800; `double` target 400; `float` target 300; `bool` target
    /// 200; all unrelated pairs 0 — no implicit conversion. Used both for
    /// implicit cast emission and for overload-candidate ranking.
    pub fn score_cast(&self, from: &Type, to: &Type) -> u32 {
        if from == to {
            return 1000;
        }
        // Array-to-pointer decay onto a matching target.
        if let (Type::Array { elem, .. }, Type::Pointer(p)) = (from, to) {
            if elem == p || matches!(&**p, Type::Void) {
                return 900;
            }
        }
        // void* adapts to and from any object pointer.
        if let (Type::Pointer(a), Type::Pointer(b)) = (from, to) {
            if matches!(&**a, Type::Void) || matches!(&**b, Type::Void) {
                return 900;
            }
        }
        if matches!(to, Type::Bool) && (from.is_arithmetic() || from.is_pointer()) {
            return 200;
        }
        if matches!(to, Type::Float(FloatWidth::F64)) && from.is_arithmetic() {
            return 400;
        }
        if matches!(to, Type::Float(FloatWidth::F32)) && from.is_arithmetic() {
            return 300;
        }
        if from.is_integral() && to.is_integral() {
            let sf = self.integral_size(from);
            let st = self.integral_size(to);
            return if sf == st { 900 } else { 800 };
        }
        0
    }

    fn integral_size(&self, ty: &Type) -> u32 {
        match ty {
            Type::Bool => 1,
            Type::Int { width, .. } => width.byte_size(&self.target),
            Type::Enum(_) => self.target.int_size,
            _ => 0,
        }
    }
}

fn int_parts(ty: &Type) -> (bool, IntWidth) {
    match ty {
        Type::Int { signed, width } => (*signed, *width),
        // Promotion leaves only integer types here.
        _ => (true, IntWidth::Int),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TypeStore {
        TypeStore::new(TargetDesc::lp64())
    }

    fn long(store: &TypeStore) -> Arc<Type> {
        store.make_int(true, IntWidth::Long)
    }

    fn ulong(store: &TypeStore) -> Arc<Type> {
        store.make_int(false, IntWidth::Long)
    }

    #[test]
    fn test_slot_counts() {
        let s = store();
        assert_eq!(s.void().slot_count(), 0);
        assert_eq!(s.int().slot_count(), 1);
        assert_eq!(s.double().slot_count(), 1);
        assert_eq!(s.pointer_to(&s.int()).slot_count(), 1);

        let arr = Type::Array {
            elem: s.int(),
            len: Some(5),
        };
        assert_eq!(arr.slot_count(), 5);

        let unsized_arr = Type::Array {
            elem: s.int(),
            len: None,
        };
        assert_eq!(unsized_arr.slot_count(), 1);
    }

    #[test]
    fn test_struct_slots_and_bytes() {
        let s = store();
        let def = StructDef {
            name: "Point".into(),
            members: vec![
                Member {
                    name: "x".into(),
                    kind: MemberKind::Field {
                        ty: s.int(),
                        slot_offset: 0,
                        byte_offset: 0,
                    },
                },
                Member {
                    name: "y".into(),
                    kind: MemberKind::Field {
                        ty: s.int(),
                        slot_offset: 1,
                        byte_offset: 4,
                    },
                },
            ],
        };
        let ty = Type::Struct(Arc::new(def));
        assert_eq!(ty.slot_count(), 2);
        assert_eq!(ty.byte_size(&TargetDesc::lp64()), Some(8));
    }

    #[test]
    fn test_empty_struct_occupies_one_slot() {
        let ty = Type::Struct(Arc::new(StructDef {
            name: "Opaque".into(),
            members: vec![],
        }));
        assert_eq!(ty.slot_count(), 1);
        assert_eq!(ty.byte_size(&TargetDesc::lp64()), Some(1));
    }

    #[test]
    fn test_byte_sizes_follow_target() {
        let s = store();
        let ilp32 = TargetDesc::ilp32();
        let lp64 = TargetDesc::lp64();
        let l = long(&s);
        assert_eq!(l.byte_size(&ilp32), Some(4));
        assert_eq!(l.byte_size(&lp64), Some(8));
        let p = s.pointer_to(&s.char_());
        assert_eq!(p.byte_size(&ilp32), Some(4));
        assert_eq!(p.byte_size(&lp64), Some(8));
    }

    #[test]
    fn test_void_byte_size_reports_and_falls_back() {
        let s = store();
        let mut sink = DiagnosticSink::new();
        let n = s.byte_size_or_int(&Type::Void, Span::point(1, 1), &mut sink);
        assert_eq!(n, 4);
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics()[0].code, DiagCode::VOID_BYTE_SIZE);
    }

    #[test]
    fn test_pointer_hash_consing() {
        let s = store();
        let a = s.pointer_to(&s.int());
        let b = s.pointer_to(&s.int());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);

        let c = s.pointer_to(&s.uint());
        assert_ne!(a, c);
    }

    #[test]
    fn test_pointer_cache_determinism_100_iterations() {
        let s = store();
        let first = s.pointer_to(&s.double());
        for i in 0..100 {
            let again = s.pointer_to(&s.double());
            assert!(
                Arc::ptr_eq(&first, &again),
                "Determinism failure at iteration {i}"
            );
        }
    }

    #[test]
    fn test_integer_promotion() {
        let s = store();
        assert_eq!(s.integer_promote(&s.char_()), s.int());
        assert_eq!(
            s.integer_promote(&s.make_int(false, IntWidth::Short)),
            s.int()
        );
        assert_eq!(s.integer_promote(&s.bool_()), s.int());
        assert_eq!(s.integer_promote(&s.uint()), s.uint());
        assert_eq!(s.integer_promote(&long(&s)), long(&s));
    }

    #[test]
    fn test_arithmetic_convert_float_dominance() {
        let s = store();
        let mut sink = DiagnosticSink::new();
        let sp = Span::point(1, 1);
        assert_eq!(
            s.arithmetic_convert(&s.int(), &s.double(), sp, &mut sink),
            s.double()
        );
        assert_eq!(
            s.arithmetic_convert(&s.float(), &s.int(), sp, &mut sink),
            s.float()
        );
        assert_eq!(
            s.arithmetic_convert(&s.float(), &s.double(), sp, &mut sink),
            s.double()
        );
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_arithmetic_convert_integer_ranking() {
        let s = store();
        let mut sink = DiagnosticSink::new();
        let sp = Span::point(1, 1);
        // Narrow operands promote first.
        assert_eq!(
            s.arithmetic_convert(&s.char_(), &s.char_(), sp, &mut sink),
            s.int()
        );
        // Unsigned wins on equal rank.
        assert_eq!(
            s.arithmetic_convert(&s.int(), &s.uint(), sp, &mut sink),
            s.uint()
        );
        // Wider wins on same signedness.
        assert_eq!(
            s.arithmetic_convert(&s.int(), &long(&s), sp, &mut sink),
            long(&s)
        );
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_arithmetic_convert_mixed_sign_by_target() {
        // unsigned int + long: on LP64 long is strictly wider and wins;
        // on ILP32 they are the same size and the result is unsigned long.
        let sp = Span::point(1, 1);

        let s64 = TypeStore::new(TargetDesc::lp64());
        let mut sink = DiagnosticSink::new();
        assert_eq!(
            s64.arithmetic_convert(&s64.uint(), &long(&s64), sp, &mut sink),
            long(&s64)
        );

        let s32 = TypeStore::new(TargetDesc::ilp32());
        let mut sink = DiagnosticSink::new();
        assert_eq!(
            s32.arithmetic_convert(&s32.uint(), &long(&s32), sp, &mut sink),
            ulong(&s32)
        );
    }

    #[test]
    fn test_arithmetic_convert_rejects_non_arithmetic() {
        let s = store();
        let mut sink = DiagnosticSink::new();
        let ptr = s.pointer_to(&s.int());
        let out = s.arithmetic_convert(&ptr, &s.int(), Span::point(2, 3), &mut sink);
        assert_eq!(out, s.int());
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics()[0].code, DiagCode::NON_ARITHMETIC);
    }

    #[test]
    fn test_score_cast_identity() {
        let s = store();
        let samples: Vec<Arc<Type>> = vec![
            s.void(),
            s.bool_(),
            s.char_(),
            s.int(),
            s.uint(),
            long(&s),
            s.float(),
            s.double(),
            s.pointer_to(&s.int()),
        ];
        for ty in &samples {
            assert_eq!(s.score_cast(ty, ty), 1000, "identity for {ty}");
        }
    }

    #[test]
    fn test_score_cast_contract() {
        let s = store();
        let l = long(&s);
        // Same-size, differently-signed integer.
        assert_eq!(s.score_cast(&s.int(), &s.uint()), 900);
        // Differing-size integer (both directions).
        assert_eq!(s.score_cast(&s.int(), &l), 800);
        assert_eq!(s.score_cast(&l, &s.int()), 800);
        // Float targets.
        assert_eq!(s.score_cast(&s.int(), &s.double()), 400);
        assert_eq!(s.score_cast(&s.int(), &s.float()), 300);
        // Bool target.
        assert_eq!(s.score_cast(&s.int(), &s.bool_()), 200);
        assert_eq!(s.score_cast(&s.pointer_to(&s.int()), &s.bool_()), 200);
        // Unrelated pairs.
        assert_eq!(s.score_cast(&s.double(), &s.int()), 0);
        assert_eq!(s.score_cast(&s.pointer_to(&s.int()), &s.int()), 0);
        assert_eq!(s.score_cast(&s.int(), &s.pointer_to(&s.int())), 0);
    }

    #[test]
    fn test_score_cast_prefers_exact_over_widening_over_narrowing() {
        let s = store();
        let exact = s.score_cast(&s.int(), &s.int());
        let widening = s.score_cast(&s.int(), &long(&s));
        let narrowing = s.score_cast(&s.int(), &s.bool_());
        assert!(exact > widening);
        assert!(widening > narrowing);
        assert!(narrowing > 0);
    }

    #[test]
    fn test_score_cast_pointer_decay() {
        let s = store();
        let arr = Arc::new(Type::Array {
            elem: s.int(),
            len: Some(4),
        });
        assert_eq!(s.score_cast(&arr, &s.pointer_to(&s.int())), 900);
        assert_eq!(s.score_cast(&arr, &s.pointer_to(&s.uint())), 0);
    }

    #[test]
    fn test_struct_equality_is_nominal() {
        let a = Type::Struct(Arc::new(StructDef {
            name: "S".into(),
            members: vec![],
        }));
        let b = Type::Struct(Arc::new(StructDef {
            name: "S".into(),
            members: vec![Member {
                name: "x".into(),
                kind: MemberKind::Field {
                    ty: Arc::new(Type::Bool),
                    slot_offset: 0,
                    byte_offset: 0,
                },
            }],
        }));
        assert_eq!(a, b);
        let c = Type::Struct(Arc::new(StructDef {
            name: "T".into(),
            members: vec![],
        }));
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_names() {
        let s = store();
        assert_eq!(format!("{}", s.int()), "int");
        assert_eq!(format!("{}", s.make_int(false, IntWidth::LongLong)), "unsigned long long");
        assert_eq!(format!("{}", s.pointer_to(&s.char_())), "char*");
        assert_eq!(format!("{}", s.double()), "double");
        let arr = Type::Array {
            elem: s.int(),
            len: Some(3),
        };
        assert_eq!(format!("{arr}"), "int[3]");
    }

    #[test]
    fn test_primitive_lookup() {
        let s = store();
        assert_eq!(s.primitive("int"), Some(s.int()));
        assert_eq!(s.primitive("unsigned long"), Some(ulong(&s)));
        assert_eq!(s.primitive("long long"), Some(s.make_int(true, IntWidth::LongLong)));
        assert_eq!(s.primitive("double"), Some(s.double()));
        assert!(s.primitive("quux").is_none());
    }
}
