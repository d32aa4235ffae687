//! Feature gating the host consults before delegating work to the server.
//!
//! Most gates resolve on demand so scoped overrides apply immediately. The
//! autocomplete flag is the exception: it is consulted on every keystroke,
//! so it is cached in an atomic and refreshed by a settings watch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use crate::host::Subscription;
use crate::resolve::SettingsResolver;

/// Symbol search flavors the host distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSearchKind {
    File,
    Project,
}

/// The `symbols` settings section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolSettings {
    pub enable: bool,
    pub enable_for_file_symbols: bool,
    pub enable_for_project_symbols: bool,
    pub ignored_tags: Vec<String>,
    pub minimum_query_length: i64,
}

impl Default for SymbolSettings {
    fn default() -> Self {
        Self {
            enable: true,
            enable_for_file_symbols: true,
            enable_for_project_symbols: true,
            ignored_tags: Vec::new(),
            minimum_query_length: 3,
        }
    }
}

fn read_autocomplete(resolver: &SettingsResolver) -> bool {
    let key = resolver.qualified("autocomplete.enable");
    resolver
        .resolve(&key, None)
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(true)
}

#[derive(Debug)]
pub struct ProviderGates {
    resolver: SettingsResolver,
    autocomplete_enabled: Arc<AtomicBool>,
    _autocomplete_watch: Subscription,
}

impl ProviderGates {
    #[must_use]
    pub fn new(resolver: SettingsResolver) -> Self {
        let flag = Arc::new(AtomicBool::new(read_autocomplete(&resolver)));
        let watched_flag = Arc::clone(&flag);
        let watched_resolver = resolver.clone();
        let key = resolver.qualified("autocomplete.enable");
        let watch = resolver.store().on_change(
            &key,
            Box::new(move || {
                watched_flag.store(read_autocomplete(&watched_resolver), Ordering::SeqCst);
            }),
        );
        Self {
            resolver,
            autocomplete_enabled: flag,
            _autocomplete_watch: watch,
        }
    }

    fn flag(&self, suffix: &str, scope: &str, fallback: bool) -> bool {
        let key = self.resolver.qualified(suffix);
        match self.resolver.resolve(&key, Some(scope)) {
            Ok(value) => value.as_bool().unwrap_or(fallback),
            Err(err) => {
                tracing::warn!("{key} fell back to {fallback}: {err}");
                fallback
            }
        }
    }

    fn int(&self, suffix: &str, fallback: i64) -> i64 {
        let key = self.resolver.qualified(suffix);
        match self.resolver.resolve(&key, None) {
            Ok(value) => value.as_int().unwrap_or(fallback),
            Err(err) => {
                tracing::warn!("{key} fell back to {fallback}: {err}");
                fallback
            }
        }
    }

    #[must_use]
    pub fn autocomplete_enabled(&self) -> bool {
        self.autocomplete_enabled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn hover_enabled(&self, scope: &str) -> bool {
        self.flag("hover.enable", scope, true)
    }

    #[must_use]
    pub fn hover_priority(&self) -> i64 {
        self.int("hover.priority", 1)
    }

    #[must_use]
    pub fn signature_help_enabled(&self, scope: &str) -> bool {
        self.flag("signatureHelp.enable", scope, true)
    }

    #[must_use]
    pub fn signature_help_priority(&self) -> i64 {
        self.int("signatureHelp.priority", 1)
    }

    /// One switch for all four formatter integrations (range, file, on-type,
    /// on-save).
    #[must_use]
    pub fn code_format_enabled(&self, scope: &str) -> bool {
        self.flag("codeFormat.enable", scope, true)
    }

    #[must_use]
    pub fn code_format_priority(&self) -> i64 {
        self.int("codeFormat.priority", 1)
    }

    #[must_use]
    pub fn symbol_settings(&self, scope: Option<&str>) -> SymbolSettings {
        let key = self.resolver.qualified("symbols");
        self.resolver.resolve_as(&key, scope).unwrap_or_else(|err| {
            tracing::warn!("symbol settings fell back to defaults: {err}");
            SymbolSettings::default()
        })
    }

    #[must_use]
    pub fn can_search_symbols(&self, kind: SymbolSearchKind, scope: Option<&str>) -> bool {
        let settings = self.symbol_settings(scope);
        settings.enable
            && match kind {
                SymbolSearchKind::File => settings.enable_for_file_symbols,
                SymbolSearchKind::Project => settings.enable_for_project_symbols,
            }
    }

    /// Symbols carrying an ignored tag (e.g. `deprecated`) are dropped from
    /// search results.
    #[must_use]
    pub fn should_ignore_symbol(&self, tag: Option<&str>, scope: Option<&str>) -> bool {
        tag.is_some_and(|tag| {
            self.symbol_settings(scope)
                .ignored_tags
                .iter()
                .any(|ignored| ignored == tag)
        })
    }

    #[must_use]
    pub fn minimum_query_length(&self, scope: Option<&str>) -> usize {
        self.symbol_settings(scope).minimum_query_length.max(0) as usize
    }
}
