use crate::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Maximum number of diagnostics stored per compilation. The running totals
/// keep counting past the cap.
pub const MAX_DIAGNOSTICS: usize = 64;

/// Diagnostic severity.
///
/// Warnings reuse the same channel and never block compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagCategory {
    Type,
    Scope,
}

/// Numeric diagnostic code (E200–E599).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiagCode(pub u16);

impl DiagCode {
    // ── Type diagnostics (E200–E299) ──
    pub const UNKNOWN_TYPE: Self = Self(200);
    pub const TYPE_MISMATCH: Self = Self(201);
    pub const NON_ARITHMETIC: Self = Self(202);
    pub const INVALID_CAST: Self = Self(203);
    pub const UNKNOWN_MEMBER: Self = Self(204);
    pub const VOID_BYTE_SIZE: Self = Self(205);
    pub const NOT_CALLABLE: Self = Self(206);
    pub const WRONG_ARG_COUNT: Self = Self(207);
    pub const AMBIGUOUS_CALL: Self = Self(208);
    pub const NO_MATCHING_OVERLOAD: Self = Self(209);
    pub const NOT_AN_LVALUE: Self = Self(210);
    pub const NOT_INDEXABLE: Self = Self(211);
    pub const VOID_VALUE: Self = Self(212);
    pub const NONCONSTANT_CASE: Self = Self(213);

    // ── Scope diagnostics (E500–E599) ──
    pub const UNDEFINED_SYMBOL: Self = Self(500);
    pub const DUPLICATE_DEFINITION: Self = Self(501);
    pub const BREAK_OUTSIDE_LOOP: Self = Self(502);
    pub const CONTINUE_OUTSIDE_LOOP: Self = Self(503);
    pub const DUPLICATE_DEFAULT: Self = Self(504);
    pub const DUPLICATE_CASE: Self = Self(505);

    /// Get the category for this diagnostic code.
    pub fn category(self) -> DiagCategory {
        match self.0 {
            200..=299 => DiagCategory::Type,
            500..=599 => DiagCategory::Scope,
            _ => DiagCategory::Type, // fallback
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for DiagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Scope => write!(f, "scope"),
        }
    }
}

/// A structured, located diagnostic.
///
/// Semantic diagnostics are non-fatal: the emitter substitutes a safe
/// fallback and keeps walking so one pass can surface many of them.
/// The embedding host renders these — it must not parse free-form strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Diagnostic code (e.g. E201).
    pub code: DiagCode,
    /// Severity.
    pub severity: Severity,
    /// Category (derived from code).
    pub category: DiagCategory,
    /// Human-readable message.
    pub message: String,
    /// Source location.
    #[serde(flatten)]
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.span, self.code, self.category, self.message
        )
    }
}

/// Per-compilation diagnostics sink.
///
/// Threaded as an explicit `&mut` parameter through every compilation call;
/// created for one compilation and discarded after use, never process-wide.
/// Identical reports (same code, span, severity, message) are deduplicated.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(DiagCode, Severity, Span, String)>,
    total_errors: usize,
    total_warnings: usize,
}

impl DiagnosticSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error.
    pub fn error(&mut self, code: DiagCode, span: Span, message: impl Into<String>) {
        self.push(code, Severity::Error, span, message.into());
    }

    /// Report a warning.
    pub fn warning(&mut self, code: DiagCode, span: Span, message: impl Into<String>) {
        self.push(code, Severity::Warning, span, message.into());
    }

    fn push(&mut self, code: DiagCode, severity: Severity, span: Span, message: String) {
        let key = (code, severity, span, message.clone());
        if self.seen.contains(&key) {
            return;
        }
        self.seen.insert(key);
        match severity {
            Severity::Error => self.total_errors += 1,
            Severity::Warning => self.total_warnings += 1,
        }
        if self.diagnostics.len() < MAX_DIAGNOSTICS {
            self.diagnostics.push(Diagnostic {
                code,
                severity,
                category: code.category(),
                message,
                span,
            });
        }
    }

    /// All stored diagnostics, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether any error-severity diagnostic was reported.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Total errors reported (including past the storage cap).
    pub fn error_count(&self) -> usize {
        self.total_errors
    }

    /// Total warnings reported.
    pub fn warning_count(&self) -> usize {
        self.total_warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diag_code_category() {
        assert_eq!(DiagCode::TYPE_MISMATCH.category(), DiagCategory::Type);
        assert_eq!(DiagCode::INVALID_CAST.category(), DiagCategory::Type);
        assert_eq!(DiagCode::UNDEFINED_SYMBOL.category(), DiagCategory::Scope);
        assert_eq!(DiagCode::BREAK_OUTSIDE_LOOP.category(), DiagCategory::Scope);
    }

    #[test]
    fn test_diag_code_display() {
        assert_eq!(format!("{}", DiagCode::TYPE_MISMATCH), "E201");
        assert_eq!(format!("{}", DiagCode::DUPLICATE_DEFAULT), "E504");
    }

    #[test]
    fn test_sink_counts() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.error(DiagCode::TYPE_MISMATCH, Span::point(1, 1), "mismatch");
        sink.warning(DiagCode::TYPE_MISMATCH, Span::point(2, 1), "suspicious");
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 1);
        assert_eq!(sink.diagnostics().len(), 2);
    }

    #[test]
    fn test_sink_deduplicates_identical_reports() {
        let mut sink = DiagnosticSink::new();
        for _ in 0..5 {
            sink.error(DiagCode::NON_ARITHMETIC, Span::point(3, 7), "not arithmetic");
        }
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics().len(), 1);

        // Different span → distinct report.
        sink.error(DiagCode::NON_ARITHMETIC, Span::point(4, 7), "not arithmetic");
        assert_eq!(sink.error_count(), 2);
    }

    #[test]
    fn test_sink_storage_cap() {
        let mut sink = DiagnosticSink::new();
        for i in 0..(MAX_DIAGNOSTICS + 10) {
            sink.error(
                DiagCode::UNDEFINED_SYMBOL,
                Span::point(i as u32 + 1, 1),
                format!("unknown symbol {i}"),
            );
        }
        assert_eq!(sink.diagnostics().len(), MAX_DIAGNOSTICS);
        assert_eq!(sink.error_count(), MAX_DIAGNOSTICS + 10);
    }

    #[test]
    fn test_warnings_do_not_block() {
        let mut sink = DiagnosticSink::new();
        sink.warning(DiagCode::TYPE_MISMATCH, Span::point(1, 1), "odd");
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_diagnostic_json_serialization() {
        let mut sink = DiagnosticSink::new();
        sink.error(
            DiagCode::TYPE_MISMATCH,
            Span::new(12, 5, 12, 22),
            "cannot assign 'float' to 'int*'",
        );
        let json = serde_json::to_string(&sink.diagnostics()[0]).unwrap();
        assert!(json.contains("\"code\""));
        assert!(json.contains("\"message\""));
        assert!(json.contains("\"start_line\""));

        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, DiagCode::TYPE_MISMATCH);
        assert_eq!(back.span, Span::new(12, 5, 12, 22));
    }
}
