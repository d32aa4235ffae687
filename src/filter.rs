//! Diagnostic suppression and decoration.
//!
//! Every diagnostic bound for the host passes through here once. Suppression
//! rules run in a fixed order: the linter kill switch, then the user's two
//! ignore lists, then the built-in denylist for plain-JavaScript buffers.
//! Settings resolve against the document's grammar scope, so a scoped
//! override changes filtering only where it applies.

use serde::Deserialize;

use crate::host::DocumentState;
use crate::ignore::IgnoreLists;
use crate::resolve::SettingsResolver;
use crate::types::Diagnostic;

/// Codes the TypeScript server reports against plain JavaScript that amount
/// to noise when no type information exists.
const JS_IGNORED_CODES: &[&str] = &[
    "80001", // file is a CommonJS module
    "7016",  // import has no type declarations
    "7006",  // parameter implicitly has an `any` type
    "9006",  // declaration emit references a private module
];

fn is_plain_javascript(scope: &str) -> bool {
    matches!(scope, "source.js" | "source.jsx")
}

/// The `linter` settings section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinterSettings {
    pub enable: bool,
    pub ignored_codes: Vec<String>,
    pub ignored_codes_when_buffer_is_modified: Vec<String>,
    pub include_message_code_in_message_body: bool,
}

impl Default for LinterSettings {
    fn default() -> Self {
        Self {
            enable: true,
            ignored_codes: Vec::new(),
            ignored_codes_when_buffer_is_modified: Vec::new(),
            include_message_code_in_message_body: false,
        }
    }
}

/// One corrective action the host can offer on a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreAction {
    pub title: String,
    pub until_save_only: bool,
}

#[derive(Debug, Clone)]
pub struct DiagnosticFilter {
    resolver: SettingsResolver,
    lists: IgnoreLists,
}

impl DiagnosticFilter {
    #[must_use]
    pub fn new(resolver: SettingsResolver) -> Self {
        Self {
            lists: IgnoreLists::new(resolver.clone()),
            resolver,
        }
    }

    #[must_use]
    pub fn lists(&self) -> &IgnoreLists {
        &self.lists
    }

    fn linter_settings(&self, scope: &str) -> LinterSettings {
        let key = self.resolver.qualified("linter");
        self.resolver
            .resolve_as(&key, Some(scope))
            .unwrap_or_else(|err| {
                tracing::warn!("linter settings fell back to defaults: {err}");
                LinterSettings::default()
            })
    }

    /// True when `diag` should never reach the host.
    #[must_use]
    pub fn should_suppress(&self, diag: &Diagnostic, doc: &DocumentState) -> bool {
        let settings = self.linter_settings(&doc.scope);
        if !settings.enable {
            return true;
        }
        let Some(code) = diag.code() else {
            // Uncoded diagnostics cannot be matched against any list.
            return false;
        };
        if settings.ignored_codes.iter().any(|c| c == code) {
            return true;
        }
        if doc.modified
            && settings
                .ignored_codes_when_buffer_is_modified
                .iter()
                .any(|c| c == code)
        {
            return true;
        }
        if is_plain_javascript(&doc.scope) && JS_IGNORED_CODES.contains(&code) {
            return true;
        }
        false
    }

    /// Appends the diagnostic's code to `message` when the user asked for
    /// it. The text being presented travels separately from the diagnostic,
    /// so earlier stages may already have rewritten it.
    #[must_use]
    pub fn decorate(&self, message: &str, diag: &Diagnostic, doc: &DocumentState) -> String {
        let settings = self.linter_settings(&doc.scope);
        match diag.code() {
            Some(code) if settings.include_message_code_in_message_body => {
                format!("{message} ({code})")
            }
            _ => message.to_string(),
        }
    }

    /// The ignore offers for one coded diagnostic. An offer disappears once
    /// its list already holds the code.
    #[must_use]
    pub fn ignore_actions(&self, code: &str, scope: Option<&str>) -> Vec<IgnoreAction> {
        let lists = self.lists.current_lists(scope);
        let mut actions = Vec::new();
        if !lists.permanent.iter().any(|c| c == code) {
            actions.push(IgnoreAction {
                title: format!("Always ignore this type of message ({code})"),
                until_save_only: false,
            });
        }
        if !lists.until_save.iter().any(|c| c == code) {
            actions.push(IgnoreAction {
                title: format!("Always ignore this type of message until save ({code})"),
                until_save_only: true,
            });
        }
        actions
    }
}
