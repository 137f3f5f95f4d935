//! Argument and result marshaling between VM cells and host values.
//!
//! The trampoline reads each VM argument cell as the typed interpretation
//! its declared parameter type requires, and converts a host result back
//! into a cell. `const char*` arguments whose address points into the
//! executable's string data decode to an owned [`NativeValue::Str`];
//! other pointers cross as raw addresses.

use crate::registry::{HostError, NativeValue};
use cobble_bytecode::{apply_conv, Executable, Value, Width, DATA_BIT};
use cobble_types::{IntWidth, Type};

/// Decode one argument cell per its declared parameter type.
pub fn decode_arg(ty: &Type, v: Value, exe: &Executable) -> Result<NativeValue, HostError> {
    match ty {
        Type::Bool => Ok(NativeValue::Int(v.is_truthy() as i64)),
        Type::Int { signed, .. } => {
            let w = Width::of(ty, &exe.target)
                .ok_or_else(|| HostError(format!("unmarshalable type '{ty}'")))?;
            if *signed {
                Ok(NativeValue::Int(apply_conv(w, Width::I64, v).as_i64()))
            } else {
                Ok(NativeValue::Uint(apply_conv(w, Width::U64, v).as_u64()))
            }
        }
        Type::Float(_) => {
            let w = Width::of(ty, &exe.target).expect("float width");
            Ok(NativeValue::Float(apply_conv(w, Width::F64, v).as_f64()))
        }
        Type::Enum(_) => Ok(NativeValue::Int(v.as_i64())),
        Type::Pointer(inner) => {
            let is_char = matches!(
                &**inner,
                Type::Int {
                    signed: true,
                    width: IntWidth::Char
                }
            );
            let addr = v.as_addr();
            if is_char && addr & DATA_BIT != 0 {
                let bytes = exe
                    .data_str(addr)
                    .ok_or_else(|| HostError(format!("invalid string address {addr:#x}")))?;
                Ok(NativeValue::Str(
                    String::from_utf8_lossy(bytes).into_owned(),
                ))
            } else {
                Ok(NativeValue::Addr(addr))
            }
        }
        _ => Err(HostError(format!("unmarshalable type '{ty}'"))),
    }
}

/// Encode a host result per the declared return type. `None` means the
/// return type is void and nothing is pushed.
pub fn encode_result(
    ty: &Type,
    result: NativeValue,
    exe: &Executable,
) -> Result<Option<Value>, HostError> {
    if ty.is_void() {
        return Ok(None);
    }
    let w = Width::of(ty, &exe.target)
        .ok_or_else(|| HostError(format!("unmarshalable return type '{ty}'")))?;
    let cell = match result {
        NativeValue::Int(x) => apply_conv(Width::I64, w, Value::from_i64(x)),
        NativeValue::Uint(x) => apply_conv(Width::U64, w, Value::from_u64(x)),
        NativeValue::Float(x) => apply_conv(Width::F64, w, Value::from_f64(x)),
        NativeValue::Addr(x) => Value::from_addr(x),
        NativeValue::Void => {
            return Err(HostError(format!(
                "host returned void but '{ty}' was declared"
            )))
        }
        NativeValue::Str(_) => {
            return Err(HostError("string returns are not supported".into()))
        }
    };
    Ok(Some(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobble_types::{TargetDesc, TypeStore};

    fn exe() -> Executable {
        Executable {
            target: TargetDesc::lp64(),
            globals: vec![],
            functions: vec![],
            code: vec![],
            strings: b"hello\0".to_vec(),
            global_slots: 0,
            init_function: 0,
        }
    }

    #[test]
    fn test_decode_signed_and_unsigned() {
        let s = TypeStore::new(TargetDesc::lp64());
        let exe = exe();
        let v = Value::from_i32(-5);
        assert_eq!(decode_arg(&s.int(), v, &exe).unwrap(), NativeValue::Int(-5));
        // The same cell read unsigned at 32 bits.
        assert_eq!(
            decode_arg(&s.uint(), v, &exe).unwrap(),
            NativeValue::Uint(0xFFFF_FFFB)
        );
    }

    #[test]
    fn test_decode_string_from_data_space() {
        let s = TypeStore::new(TargetDesc::lp64());
        let exe = exe();
        let charp = s.pointer_to(&s.char_());
        let got = decode_arg(&charp, Value::from_addr(DATA_BIT), &exe).unwrap();
        assert_eq!(got, NativeValue::Str("hello".into()));

        // A non-char pointer crosses as a raw address.
        let intp = s.pointer_to(&s.int());
        let got = decode_arg(&intp, Value::from_addr(12), &exe).unwrap();
        assert_eq!(got, NativeValue::Addr(12));
    }

    #[test]
    fn test_encode_result_narrows_to_declared_width() {
        let s = TypeStore::new(TargetDesc::lp64());
        let exe = exe();
        let cell = encode_result(&s.char_(), NativeValue::Int(0x1FF), &exe)
            .unwrap()
            .unwrap();
        assert_eq!(cell.as_i8(), -1);
    }

    #[test]
    fn test_encode_void_pushes_nothing() {
        let s = TypeStore::new(TargetDesc::lp64());
        let exe = exe();
        assert_eq!(
            encode_result(&s.void(), NativeValue::Void, &exe).unwrap(),
            None
        );
    }
}
