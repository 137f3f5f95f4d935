//! Shared arithmetic kernels.
//!
//! One implementation of every width-specialized operation, used by both
//! the constant folder and the VM's execute loop. Anything folded at
//! compile time therefore produces the exact bit pattern execution would.
//!
//! Integer arithmetic wraps; shift counts are masked to the operand width;
//! float→int conversions saturate (Rust `as` semantics) — all deterministic.

use crate::op::{BinFamily, UnFamily, Width};
use crate::Value;
use thiserror::Error;

/// Errors a kernel can raise. `ZeroDivide` becomes a runtime fault in the
/// VM and suppresses folding in the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("integer division by zero")]
    ZeroDivide,
    #[error("operation not defined at this width")]
    Unsupported,
}

macro_rules! int_binary {
    ($as:ident, $from:ident, $family:expr, $a:expr, $b:expr) => {{
        let a = $a.$as();
        let b = $b.$as();
        match $family {
            BinFamily::Add => Value::$from(a.wrapping_add(b)),
            BinFamily::Sub => Value::$from(a.wrapping_sub(b)),
            BinFamily::Mul => Value::$from(a.wrapping_mul(b)),
            BinFamily::Div => {
                if b == 0 {
                    return Err(KernelError::ZeroDivide);
                }
                Value::$from(a.wrapping_div(b))
            }
            BinFamily::Rem => {
                if b == 0 {
                    return Err(KernelError::ZeroDivide);
                }
                Value::$from(a.wrapping_rem(b))
            }
            BinFamily::BitAnd => Value::$from(a & b),
            BinFamily::BitOr => Value::$from(a | b),
            BinFamily::BitXor => Value::$from(a ^ b),
            BinFamily::Shl => Value::$from(a.wrapping_shl(b as u32)),
            BinFamily::Shr => Value::$from(a.wrapping_shr(b as u32)),
            BinFamily::Eq => Value::from_bool(a == b),
            BinFamily::Gt => Value::from_bool(a > b),
            BinFamily::Ge => Value::from_bool(a >= b),
        }
    }};
}

macro_rules! float_binary {
    ($as:ident, $from:ident, $family:expr, $a:expr, $b:expr) => {{
        let a = $a.$as();
        let b = $b.$as();
        match $family {
            BinFamily::Add => Value::$from(a + b),
            BinFamily::Sub => Value::$from(a - b),
            BinFamily::Mul => Value::$from(a * b),
            BinFamily::Div => Value::$from(a / b),
            BinFamily::Eq => Value::from_bool(a == b),
            BinFamily::Gt => Value::from_bool(a > b),
            BinFamily::Ge => Value::from_bool(a >= b),
            _ => return Err(KernelError::Unsupported),
        }
    }};
}

/// Apply a binary operation at the given width.
pub fn apply_binary(
    family: BinFamily,
    width: Width,
    a: Value,
    b: Value,
) -> Result<Value, KernelError> {
    Ok(match width {
        Width::I8 => int_binary!(as_i8, from_i8, family, a, b),
        Width::U8 => int_binary!(as_u8, from_u8, family, a, b),
        Width::I16 => int_binary!(as_i16, from_i16, family, a, b),
        Width::U16 => int_binary!(as_u16, from_u16, family, a, b),
        Width::I32 => int_binary!(as_i32, from_i32, family, a, b),
        Width::U32 => int_binary!(as_u32, from_u32, family, a, b),
        Width::I64 => int_binary!(as_i64, from_i64, family, a, b),
        Width::U64 => int_binary!(as_u64, from_u64, family, a, b),
        Width::F32 => float_binary!(as_f32, from_f32, family, a, b),
        Width::F64 => float_binary!(as_f64, from_f64, family, a, b),
    })
}

/// Apply a unary operation at the given width.
pub fn apply_unary(family: UnFamily, width: Width, v: Value) -> Result<Value, KernelError> {
    Ok(match (family, width) {
        (UnFamily::Neg, Width::I8) => Value::from_i8(v.as_i8().wrapping_neg()),
        (UnFamily::Neg, Width::U8) => Value::from_u8(v.as_u8().wrapping_neg()),
        (UnFamily::Neg, Width::I16) => Value::from_i16(v.as_i16().wrapping_neg()),
        (UnFamily::Neg, Width::U16) => Value::from_u16(v.as_u16().wrapping_neg()),
        (UnFamily::Neg, Width::I32) => Value::from_i32(v.as_i32().wrapping_neg()),
        (UnFamily::Neg, Width::U32) => Value::from_u32(v.as_u32().wrapping_neg()),
        (UnFamily::Neg, Width::I64) => Value::from_i64(v.as_i64().wrapping_neg()),
        (UnFamily::Neg, Width::U64) => Value::from_u64(v.as_u64().wrapping_neg()),
        (UnFamily::Neg, Width::F32) => Value::from_f32(-v.as_f32()),
        (UnFamily::Neg, Width::F64) => Value::from_f64(-v.as_f64()),
        (UnFamily::BitNot, Width::I8) => Value::from_i8(!v.as_i8()),
        (UnFamily::BitNot, Width::U8) => Value::from_u8(!v.as_u8()),
        (UnFamily::BitNot, Width::I16) => Value::from_i16(!v.as_i16()),
        (UnFamily::BitNot, Width::U16) => Value::from_u16(!v.as_u16()),
        (UnFamily::BitNot, Width::I32) => Value::from_i32(!v.as_i32()),
        (UnFamily::BitNot, Width::U32) => Value::from_u32(!v.as_u32()),
        (UnFamily::BitNot, Width::I64) => Value::from_i64(!v.as_i64()),
        (UnFamily::BitNot, Width::U64) => Value::from_u64(!v.as_u64()),
        (UnFamily::BitNot, Width::F32 | Width::F64) => {
            return Err(KernelError::Unsupported)
        }
    })
}

/// One decoded value lane, the intermediate of every conversion.
enum Lane {
    S(i64),
    U(u64),
    F(f64),
}

fn read(width: Width, v: Value) -> Lane {
    match width {
        Width::I8 => Lane::S(v.as_i8() as i64),
        Width::I16 => Lane::S(v.as_i16() as i64),
        Width::I32 => Lane::S(v.as_i32() as i64),
        Width::I64 => Lane::S(v.as_i64()),
        Width::U8 => Lane::U(v.as_u8() as u64),
        Width::U16 => Lane::U(v.as_u16() as u64),
        Width::U32 => Lane::U(v.as_u32() as u64),
        Width::U64 => Lane::U(v.as_u64()),
        Width::F32 => Lane::F(v.as_f32() as f64),
        Width::F64 => Lane::F(v.as_f64()),
    }
}

macro_rules! write_int {
    ($ty:ty, $from:ident, $lane:expr) => {
        match $lane {
            Lane::S(x) => Value::$from(x as $ty),
            Lane::U(x) => Value::$from(x as $ty),
            Lane::F(x) => Value::$from(x as $ty),
        }
    };
}

fn write(width: Width, lane: Lane) -> Value {
    match width {
        Width::I8 => write_int!(i8, from_i8, lane),
        Width::U8 => write_int!(u8, from_u8, lane),
        Width::I16 => write_int!(i16, from_i16, lane),
        Width::U16 => write_int!(u16, from_u16, lane),
        Width::I32 => write_int!(i32, from_i32, lane),
        Width::U32 => write_int!(u32, from_u32, lane),
        Width::I64 => write_int!(i64, from_i64, lane),
        Width::U64 => write_int!(u64, from_u64, lane),
        Width::F32 => match lane {
            Lane::S(x) => Value::from_f32(x as f32),
            Lane::U(x) => Value::from_f32(x as f32),
            Lane::F(x) => Value::from_f32(x as f32),
        },
        Width::F64 => match lane {
            Lane::S(x) => Value::from_f64(x as f64),
            Lane::U(x) => Value::from_f64(x as f64),
            Lane::F(x) => Value::from_f64(x),
        },
    }
}

/// Convert a cell from one width class to another: narrowing truncation,
/// sign/zero-extending widen, or int↔float conversion, chosen by the pair.
pub fn apply_conv(from: Width, to: Width, v: Value) -> Value {
    if from == to {
        return v;
    }
    write(to, read(from, v))
}
