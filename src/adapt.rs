//! Wire-shape adaptation between the protocol and the host.
//!
//! The protocol speaks `line`/`character`; the host speaks `row`/`column`.
//! Numbers relabel one-to-one and are never transformed. Shape differences
//! (the three-way edit union, number-or-string codes) are resolved here so
//! nothing downstream ever sees a protocol structure.

use serde::Deserialize;

use crate::types::{Diagnostic, DiagnosticSeverity, Point, Range, Suggestion, TextEdit};

/// Protocol position, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LsPosition {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LsRange {
    pub start: LsPosition,
    pub end: LsPosition,
}

impl From<LsPosition> for Point {
    fn from(pos: LsPosition) -> Self {
        Self::new(pos.line, pos.character)
    }
}

impl From<LsRange> for Range {
    fn from(range: LsRange) -> Self {
        Self::new(range.start.into(), range.end.into())
    }
}

/// An edit as a server sends it: exactly one of the three span fields should
/// be present, but the wire cannot enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTextEdit {
    #[serde(default)]
    pub range: Option<LsRange>,
    #[serde(default)]
    pub insert: Option<LsRange>,
    #[serde(default)]
    pub replace: Option<LsRange>,
    pub new_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("text edit supplies none of range, insert, or replace")]
pub struct MalformedEditError;

/// Which edit shape a server actually supplied, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Range(LsRange),
    /// Insert half of an insert/replace pair.
    Insert(LsRange),
    /// Replace half of an insert/replace pair.
    Replace(LsRange),
}

impl EditTarget {
    /// Classifies a raw edit. `range` wins over `insert` wins over `replace`.
    pub fn from_raw(raw: &RawTextEdit) -> Result<Self, MalformedEditError> {
        if let Some(range) = raw.range {
            Ok(Self::Range(range))
        } else if let Some(insert) = raw.insert {
            Ok(Self::Insert(insert))
        } else if let Some(replace) = raw.replace {
            Ok(Self::Replace(replace))
        } else {
            Err(MalformedEditError)
        }
    }

    #[must_use]
    pub fn span(self) -> LsRange {
        match self {
            Self::Range(range) | Self::Insert(range) | Self::Replace(range) => range,
        }
    }
}

impl TryFrom<RawTextEdit> for TextEdit {
    type Error = MalformedEditError;

    fn try_from(raw: RawTextEdit) -> Result<Self, Self::Error> {
        let target = EditTarget::from_raw(&raw)?;
        Ok(Self {
            range: target.span().into(),
            new_text: raw.new_text,
        })
    }
}

/// Protocol diagnostic codes arrive as numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DiagnosticCode {
    Number(i64),
    Text(String),
}

impl DiagnosticCode {
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDiagnostic {
    pub range: LsRange,
    #[serde(default)]
    pub severity: Option<u64>,
    #[serde(default)]
    pub code: Option<DiagnosticCode>,
    pub message: String,
}

impl From<RawDiagnostic> for Diagnostic {
    fn from(raw: RawDiagnostic) -> Self {
        Self::new(
            raw.code.map(DiagnosticCode::into_string),
            raw.range.into(),
            DiagnosticSeverity::from_lsp(raw.severity),
            raw.message,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCompletionItem {
    pub label: String,
    #[serde(default)]
    pub text_edit: Option<RawTextEdit>,
    #[serde(default)]
    pub additional_text_edits: Vec<RawTextEdit>,
}

fn adapt_edit(raw: RawTextEdit, label: &str) -> Option<TextEdit> {
    match TextEdit::try_from(raw) {
        Ok(edit) => Some(edit),
        Err(err) => {
            tracing::warn!("dropping edit on completion {label:?}: {err}");
            None
        }
    }
}

/// Adapts one completion item. Malformed edits drop individually; the rest
/// of the item survives and additional edits keep their order.
#[must_use]
pub fn adapt_completion(item: RawCompletionItem) -> Suggestion {
    let RawCompletionItem {
        label,
        text_edit,
        additional_text_edits,
    } = item;
    let text_edit = text_edit.and_then(|raw| adapt_edit(raw, &label));
    let additional_text_edits = additional_text_edits
        .into_iter()
        .filter_map(|raw| adapt_edit(raw, &label))
        .collect();
    Suggestion {
        text: label,
        text_edit,
        additional_text_edits,
    }
}

/// Code-action kinds this client requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeActionKind {
    QuickFix,
    Refactor,
    RefactorExtract,
    RefactorInline,
    RefactorRewrite,
    Source,
    SourceOrganizeImports,
    SourceFixAll,
}

impl CodeActionKind {
    pub const ALL: [Self; 8] = [
        Self::QuickFix,
        Self::Refactor,
        Self::RefactorExtract,
        Self::RefactorInline,
        Self::RefactorRewrite,
        Self::Source,
        Self::SourceOrganizeImports,
        Self::SourceFixAll,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuickFix => "quickfix",
            Self::Refactor => "refactor",
            Self::RefactorExtract => "refactor.extract",
            Self::RefactorInline => "refactor.inline",
            Self::RefactorRewrite => "refactor.rewrite",
            Self::Source => "source",
            Self::SourceOrganizeImports => "source.organizeImports",
            Self::SourceFixAll => "source.fixAll",
        }
    }
}

/// Kinds to request at a position. The server misbehaves when kinds are
/// requested alongside existing diagnostics, so ask for none there and the
/// full catalog everywhere else.
#[must_use]
pub fn kinds_for_request(diagnostics_at_position: &[Diagnostic]) -> &'static [CodeActionKind] {
    if diagnostics_at_position.is_empty() {
        &CodeActionKind::ALL
    } else {
        &[]
    }
}

/// The server's reported signature-help retrigger set, with `>` ensured so
/// help closes after a generic parameter list.
#[must_use]
pub fn signature_retriggers(mut reported: Vec<String>) -> Vec<String> {
    if !reported.iter().any(|c| c == ">") {
        reported.push(">".to_string());
    }
    reported
}
