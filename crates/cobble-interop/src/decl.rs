//! C-style declaration scanning and generation.
//!
//! Registration declarations are small: a return type, a name, and a
//! parenthesized parameter list over the primitive mapping table —
//! integers, floats, pointers, and strings as `const char*`. Optional
//! trailing `= literal` defaults are accepted on parameters.

use crate::registry::InteropError;
use cobble_types::{DefaultArg, FunctionSig, Param, Type, TypeStore};
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Scanner
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Star,
    LParen,
    RParen,
    Comma,
    Assign,
    Number(String),
}

fn scan(decl: &str) -> Result<Vec<Tok>, InteropError> {
    let mut toks = Vec::new();
    let mut chars = decl.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            }
            '=' => {
                chars.next();
                toks.push(Tok::Assign);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Word(word));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut num = String::new();
                num.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Number(num));
            }
            other => {
                return Err(InteropError::Parse {
                    decl: decl.to_string(),
                    reason: format!("unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(toks)
}

// ══════════════════════════════════════════════════════════════════════════════
// Parser
// ══════════════════════════════════════════════════════════════════════════════

const TYPE_WORDS: &[&str] = &[
    "void", "bool", "char", "short", "int", "long", "float", "double", "signed", "unsigned",
];

struct DeclParser<'a> {
    decl: &'a str,
    toks: Vec<Tok>,
    pos: usize,
    store: &'a TypeStore,
}

impl<'a> DeclParser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn fail(&self, reason: impl Into<String>) -> InteropError {
        InteropError::Parse {
            decl: self.decl.to_string(),
            reason: reason.into(),
        }
    }

    /// Parse `[const] type-words '*'*`.
    fn parse_type(&mut self) -> Result<Arc<Type>, InteropError> {
        let mut words: Vec<String> = Vec::new();
        while let Some(Tok::Word(w)) = self.peek() {
            if w == "const" {
                self.next(); // constness is not tracked
                continue;
            }
            if TYPE_WORDS.contains(&w.as_str()) {
                words.push(w.clone());
                self.next();
            } else {
                break;
            }
        }
        if words.is_empty() {
            return Err(self.fail("expected a type name"));
        }
        let name = words.join(" ");
        let mut ty = self
            .store
            .primitive(&name)
            .ok_or_else(|| InteropError::UnknownType(name.clone()))?;
        while matches!(self.peek(), Some(Tok::Star)) {
            self.next();
            ty = self.store.pointer_to(&ty);
        }
        Ok(ty)
    }

    fn parse_param(&mut self) -> Result<Param, InteropError> {
        let ty = self.parse_type()?;
        let name = match self.peek() {
            Some(Tok::Word(w)) => {
                let n = w.clone();
                self.next();
                n
            }
            _ => String::new(),
        };
        let default = if matches!(self.peek(), Some(Tok::Assign)) {
            self.next();
            match self.next() {
                Some(Tok::Number(n)) => {
                    if n.contains('.') {
                        let v: f64 = n
                            .parse()
                            .map_err(|_| self.fail(format!("bad default '{n}'")))?;
                        Some(DefaultArg::Float(v))
                    } else {
                        let v: i64 = n
                            .parse()
                            .map_err(|_| self.fail(format!("bad default '{n}'")))?;
                        Some(DefaultArg::Int(v))
                    }
                }
                _ => return Err(self.fail("expected a literal default value")),
            }
        } else {
            None
        };
        Ok(Param { name, ty, default })
    }
}

/// Parse a declaration string like `"int add(int a, int b)"` into a
/// function name and signature.
pub fn parse_decl(
    store: &TypeStore,
    decl: &str,
) -> Result<(String, Arc<FunctionSig>), InteropError> {
    let toks = scan(decl)?;
    let mut p = DeclParser {
        decl,
        toks,
        pos: 0,
        store,
    };

    let ret = p.parse_type()?;
    let name = match p.next() {
        Some(Tok::Word(w)) => w,
        _ => return Err(p.fail("expected a function name")),
    };
    if !matches!(p.next(), Some(Tok::LParen)) {
        return Err(p.fail("expected '('"));
    }

    let mut params = Vec::new();
    if !matches!(p.peek(), Some(Tok::RParen)) {
        loop {
            let param = p.parse_param()?;
            // `f(void)` means an empty parameter list.
            if !(params.is_empty() && param.ty.is_void() && param.name.is_empty()) {
                if param.ty.is_void() {
                    return Err(p.fail("parameter has type void"));
                }
                params.push(param);
            }
            match p.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => break,
                _ => return Err(p.fail("expected ',' or ')'")),
            }
        }
    } else {
        p.next();
    }
    if p.peek().is_some() {
        return Err(p.fail("trailing tokens after ')'"));
    }

    let sig = FunctionSig {
        ret,
        params,
        is_instance: false,
        qualifier: None,
    };
    Ok((name, Arc::new(sig)))
}

/// Render a signature back to declaration text using the primitive mapping
/// table. `char*` renders as `const char*` — the string convention.
pub fn decl_for(name: &str, sig: &FunctionSig) -> String {
    let mut out = String::new();
    out.push_str(&type_text(&sig.ret));
    out.push(' ');
    out.push_str(name);
    out.push('(');
    for (i, p) in sig.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&type_text(&p.ty));
        if !p.name.is_empty() {
            out.push(' ');
            out.push_str(&p.name);
        }
        match p.default {
            Some(DefaultArg::Int(v)) => out.push_str(&format!(" = {v}")),
            Some(DefaultArg::Float(v)) => out.push_str(&format!(" = {v}")),
            None => {}
        }
    }
    out.push(')');
    out
}

fn type_text(ty: &Type) -> String {
    if let Type::Pointer(inner) = ty {
        if matches!(
            &**inner,
            Type::Int {
                signed: true,
                width: cobble_types::IntWidth::Char
            }
        ) {
            return "const char*".to_string();
        }
    }
    format!("{ty}")
}
