//! Host-facing data records: buffer coordinates, diagnostics, text edits.
//!
//! Everything here is already adapted for the editor host. Wire-shaped
//! structures live in [`crate::adapt`] and are converted at that boundary.

use serde::{Deserialize, Serialize};

/// Zero-based buffer position in host terms.
///
/// The language server's `line`/`character` relabel to `row`/`column`
/// unchanged; no coordinate arithmetic happens anywhere in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Half-open span between two [`Point`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Point,
    pub end: Point,
}

impl Range {
    #[must_use]
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// A single buffer replacement in host coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// Completion suggestion after adaptation.
///
/// `additional_text_edits` keeps the server's order; hosts apply them
/// verbatim after the primary edit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suggestion {
    pub text: String,
    pub text_edit: Option<TextEdit>,
    pub additional_text_edits: Vec<TextEdit>,
}

/// Severity levels, ordered most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl DiagnosticSeverity {
    /// Maps the protocol's numeric severity. Servers may omit or extend the
    /// range; anything unknown lands on `Warning`.
    #[must_use]
    pub fn from_lsp(severity: Option<u64>) -> Self {
        match severity {
            Some(1) => Self::Error,
            Some(3) => Self::Information,
            Some(4) => Self::Hint,
            _ => Self::Warning,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// One diagnostic in host terms.
///
/// Fields are private so construction stays in the adaptation layer and the
/// record cannot drift after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    code: Option<String>,
    range: Range,
    severity: DiagnosticSeverity,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        code: Option<String>,
        range: Range,
        severity: DiagnosticSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            range,
            severity,
            message: message.into(),
        }
    }

    /// Server-assigned code, normalized to a string. Absent on servers that
    /// never assign codes; the filter passes such diagnostics through.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_known_values_and_defaults_to_warning() {
        assert_eq!(DiagnosticSeverity::from_lsp(Some(1)), DiagnosticSeverity::Error);
        assert_eq!(DiagnosticSeverity::from_lsp(Some(2)), DiagnosticSeverity::Warning);
        assert_eq!(DiagnosticSeverity::from_lsp(Some(3)), DiagnosticSeverity::Information);
        assert_eq!(DiagnosticSeverity::from_lsp(Some(4)), DiagnosticSeverity::Hint);
        assert_eq!(DiagnosticSeverity::from_lsp(Some(99)), DiagnosticSeverity::Warning);
        assert_eq!(DiagnosticSeverity::from_lsp(None), DiagnosticSeverity::Warning);
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(DiagnosticSeverity::Error < DiagnosticSeverity::Warning);
        assert!(DiagnosticSeverity::Warning < DiagnosticSeverity::Hint);
    }

    #[test]
    fn diagnostic_exposes_normalized_code() {
        let diag = Diagnostic::new(
            Some("2304".into()),
            Range::new(Point::new(0, 0), Point::new(0, 4)),
            DiagnosticSeverity::Error,
            "Cannot find name 'foo'.",
        );
        assert_eq!(diag.code(), Some("2304"));
        assert!(diag.severity().is_error());
        assert_eq!(diag.range().end.column, 4);
    }
}
