use serde::{Deserialize, Serialize};

/// Byte widths of the primitive types for one target ABI.
///
/// Created once per compilation/execution session and never mutated; every
/// size and alignment fact the toolchain needs comes from here. An
/// `Executable` records the description it was compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDesc {
    pub char_size: u32,
    pub short_size: u32,
    pub int_size: u32,
    pub long_size: u32,
    pub long_long_size: u32,
    pub float_size: u32,
    pub double_size: u32,
    pub pointer_size: u32,
}

impl TargetDesc {
    /// 32-bit ABI: 4-byte `int`, `long`, and pointers.
    pub fn ilp32() -> Self {
        Self {
            char_size: 1,
            short_size: 2,
            int_size: 4,
            long_size: 4,
            long_long_size: 8,
            float_size: 4,
            double_size: 8,
            pointer_size: 4,
        }
    }

    /// 64-bit ABI: 8-byte `long` and pointers, 4-byte `int`.
    pub fn lp64() -> Self {
        Self {
            char_size: 1,
            short_size: 2,
            int_size: 4,
            long_size: 8,
            long_long_size: 8,
            float_size: 4,
            double_size: 8,
            pointer_size: 8,
        }
    }
}
