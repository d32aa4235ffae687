//! Declared settings catalog for the package.
//!
//! Mirrors the package manifest's configuration schema: every key the
//! resolver may be asked for appears here with its kind and default. Group
//! keys are declared alongside their leaves so object-valued reads have a
//! default layer to merge over.

use std::collections::BTreeMap;

use crate::settings::{SettingKind, SettingSchema, SettingValue};

fn linter_defaults() -> SettingValue {
    SettingValue::object([
        ("enable", SettingValue::Bool(true)),
        ("ignoredCodes", SettingValue::List(Vec::new())),
        ("ignoredCodesWhenBufferIsModified", SettingValue::List(Vec::new())),
        ("includeMessageCodeInMessageBody", SettingValue::Bool(false)),
    ])
}

fn symbols_defaults() -> SettingValue {
    SettingValue::object([
        ("enable", SettingValue::Bool(true)),
        ("enableForFileSymbols", SettingValue::Bool(true)),
        ("enableForProjectSymbols", SettingValue::Bool(true)),
        ("ignoredTags", SettingValue::List(Vec::new())),
        ("minimumQueryLength", SettingValue::Int(3)),
    ])
}

/// Full key → schema catalog, with every key prefixed by `package`.
#[must_use]
pub fn package_schema(package: &str) -> BTreeMap<String, SettingSchema> {
    let mut schema = BTreeMap::new();
    let mut declare = |suffix: &str, kind: SettingKind, default: SettingValue| {
        schema.insert(format!("{package}.{suffix}"), SettingSchema::new(kind, default));
    };

    declare("nodeBin", SettingKind::String, SettingValue::from("node"));
    declare("includeJavaScript", SettingKind::Boolean, SettingValue::Bool(false));

    declare(
        "advanced",
        SettingKind::Object,
        SettingValue::object([("additionalScopes", SettingValue::List(Vec::new()))]),
    );
    declare("advanced.additionalScopes", SettingKind::List, SettingValue::List(Vec::new()));

    declare(
        "implicitProjectConfiguration",
        SettingKind::Object,
        SettingValue::object([("checkJs", SettingValue::Bool(false))]),
    );
    declare(
        "implicitProjectConfiguration.checkJs",
        SettingKind::Boolean,
        SettingValue::Bool(false),
    );

    declare("linter", SettingKind::Object, linter_defaults());
    declare("linter.enable", SettingKind::Boolean, SettingValue::Bool(true));
    declare("linter.ignoredCodes", SettingKind::List, SettingValue::List(Vec::new()));
    declare(
        "linter.ignoredCodesWhenBufferIsModified",
        SettingKind::List,
        SettingValue::List(Vec::new()),
    );
    declare(
        "linter.includeMessageCodeInMessageBody",
        SettingKind::Boolean,
        SettingValue::Bool(false),
    );

    declare(
        "autocomplete",
        SettingKind::Object,
        SettingValue::object([("enable", SettingValue::Bool(true))]),
    );
    declare("autocomplete.enable", SettingKind::Boolean, SettingValue::Bool(true));

    declare(
        "hover",
        SettingKind::Object,
        SettingValue::object([
            ("enable", SettingValue::Bool(true)),
            ("priority", SettingValue::Int(1)),
        ]),
    );
    declare("hover.enable", SettingKind::Boolean, SettingValue::Bool(true));
    declare("hover.priority", SettingKind::Integer, SettingValue::Int(1));

    declare(
        "signatureHelp",
        SettingKind::Object,
        SettingValue::object([
            ("enable", SettingValue::Bool(true)),
            ("priority", SettingValue::Int(1)),
        ]),
    );
    declare("signatureHelp.enable", SettingKind::Boolean, SettingValue::Bool(true));
    declare("signatureHelp.priority", SettingKind::Integer, SettingValue::Int(1));

    declare(
        "codeFormat",
        SettingKind::Object,
        SettingValue::object([
            ("enable", SettingValue::Bool(true)),
            ("priority", SettingValue::Int(1)),
            ("formattingRules", SettingValue::Object(BTreeMap::new())),
        ]),
    );
    declare("codeFormat.enable", SettingKind::Boolean, SettingValue::Bool(true));
    declare("codeFormat.priority", SettingKind::Integer, SettingValue::Int(1));
    declare(
        "codeFormat.formattingRules",
        SettingKind::Object,
        SettingValue::Object(BTreeMap::new()),
    );

    declare("symbols", SettingKind::Object, symbols_defaults());
    declare("symbols.enable", SettingKind::Boolean, SettingValue::Bool(true));
    declare("symbols.enableForFileSymbols", SettingKind::Boolean, SettingValue::Bool(true));
    declare("symbols.enableForProjectSymbols", SettingKind::Boolean, SettingValue::Bool(true));
    declare("symbols.ignoredTags", SettingKind::List, SettingValue::List(Vec::new()));
    declare("symbols.minimumQueryLength", SettingKind::Integer, SettingValue::Int(3));

    schema
}
