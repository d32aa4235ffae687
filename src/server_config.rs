//! Workspace configuration pushed to the server.
//!
//! The server wants one `typescript` and one `javascript` section, each with
//! formatting preferences, plus the implicit-project block. Formatting is
//! derived from the host's own editor settings for the matching grammar
//! scope, with the user's `formattingRules` overriding anything computed.

use serde_json::{Value, json};

use crate::resolve::SettingsResolver;
use crate::settings::SettingValue;

const DEFAULT_TAB_LENGTH: i64 = 2;

/// Host editor keys are read raw: they belong to the host, not this package,
/// so they carry no entry in the package schema.
fn editor_int(resolver: &SettingsResolver, key: &str, scope: &str, fallback: i64) -> i64 {
    let store = resolver.store();
    store
        .get(key, Some(scope))
        .or_else(|| store.get(key, None))
        .and_then(|value| value.as_int())
        .unwrap_or(fallback)
}

fn editor_bool(resolver: &SettingsResolver, key: &str, scope: &str, fallback: bool) -> bool {
    let store = resolver.store();
    store
        .get(key, Some(scope))
        .or_else(|| store.get(key, None))
        .and_then(|value| value.as_bool())
        .unwrap_or(fallback)
}

/// Formatting section for one grammar scope.
#[must_use]
pub fn format_settings_for_scope(resolver: &SettingsResolver, scope: &str) -> Value {
    let tab_length = editor_int(resolver, "editor.tabLength", scope, DEFAULT_TAB_LENGTH);
    let soft_tabs = editor_bool(resolver, "editor.softTabs", scope, true);
    let mut format = json!({
        "indentSize": tab_length,
        "tabSize": tab_length,
        "indentStyle": "None",
        "convertTabsToSpaces": soft_tabs,
    });

    let rules_key = resolver.qualified("codeFormat.formattingRules");
    if let Ok(SettingValue::Object(rules)) = resolver.resolve(&rules_key, Some(scope)) {
        if let Some(section) = format.as_object_mut() {
            for (key, value) in rules {
                section.insert(key, Value::from(value));
            }
        }
    }
    if let Some(section) = format.as_object_mut() {
        // Inserted after the rules overlay; a same-named rule cannot
        // displace it.
        section.insert(
            "completions".to_string(),
            json!({ "completeFunctionCalls": true }),
        );
    }
    format
}

fn dialect_section(resolver: &SettingsResolver, scope: &str) -> Value {
    json!({
        "format": format_settings_for_scope(resolver, scope),
        "implementationsCodeLens": { "enabled": true },
        "referencesCodeLens": { "enabled": true },
    })
}

/// Full payload for a configuration push.
#[must_use]
pub fn configuration_bundle(resolver: &SettingsResolver) -> Value {
    let implicit_key = resolver.qualified("implicitProjectConfiguration");
    let implicit = match resolver.resolve(&implicit_key, None) {
        Ok(value) => Value::from(value),
        Err(err) => {
            tracing::warn!("implicit project configuration unresolvable: {err}");
            json!({})
        }
    };
    json!({
        "typescript": dialect_section(resolver, "source.ts"),
        "javascript": dialect_section(resolver, "source.js"),
        "implicitProjectConfiguration": implicit,
    })
}
