//! Generated header text.
//!
//! Hosts hand scripts a set of fixed-width integer typedefs consistent
//! with the chosen target description, so `int32_t` always means what the
//! compilation meant by it.

use cobble_types::TargetDesc;

/// Render the fixed-width typedef header for a target.
pub fn header_text(target: &TargetDesc) -> String {
    let named: [(&str, u32); 5] = [
        ("char", target.char_size),
        ("short", target.short_size),
        ("int", target.int_size),
        ("long", target.long_size),
        ("long long", target.long_long_size),
    ];
    let pick = |bytes: u32| named.iter().find(|&&(_, s)| s == bytes).map(|&(n, _)| n);

    let mut out = String::from("/* Fixed-width typedefs for the configured target. */\n");
    for (bits, bytes) in [(8u32, 1u32), (16, 2), (32, 4), (64, 8)] {
        if let Some(name) = pick(bytes) {
            let signed = if name == "char" { "signed char" } else { name };
            out.push_str(&format!("typedef {signed} int{bits}_t;\n"));
            out.push_str(&format!("typedef unsigned {name} uint{bits}_t;\n"));
        }
    }
    if let Some(name) = pick(target.pointer_size) {
        out.push_str(&format!("typedef {name} intptr_t;\n"));
        out.push_str(&format!("typedef unsigned {name} uintptr_t;\n"));
    }
    out
}
