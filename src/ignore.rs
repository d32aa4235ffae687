//! The two persisted ignored-code lists.
//!
//! `linter.ignoredCodes` suppresses a code everywhere; the
//! `...WhenBufferIsModified` list suppresses it only while the buffer has
//! unsaved changes. A code lives in at most one of the two, so ignoring it
//! with the other flavor moves it rather than duplicating it. Mutations read
//! and write the global layer, matching how the lists are presented in the
//! package settings UI.

use crate::resolve::SettingsResolver;
use crate::settings::SettingValue;

const PERMANENT_KEY: &str = "linter.ignoredCodes";
const UNTIL_SAVE_KEY: &str = "linter.ignoredCodesWhenBufferIsModified";

/// Snapshot of both lists, resolved against an optional scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IgnoredCodes {
    pub permanent: Vec<String>,
    pub until_save: Vec<String>,
}

/// Write-through manager for the ignore lists.
#[derive(Debug, Clone)]
pub struct IgnoreLists {
    resolver: SettingsResolver,
}

impl IgnoreLists {
    #[must_use]
    pub fn new(resolver: SettingsResolver) -> Self {
        Self { resolver }
    }

    fn global_list(&self, key: &str) -> Vec<String> {
        self.resolver
            .store()
            .get(key, None)
            .and_then(|value| value.as_list().map(<[String]>::to_vec))
            .unwrap_or_default()
    }

    /// Adds `code` to one list and removes it from the other. Idempotent:
    /// re-ignoring with the same flavor changes nothing. The destination
    /// list is written first, so a watcher firing between the two writes
    /// sees the code in both lists rather than in neither.
    pub fn ignore(&self, code: &str, until_save_only: bool) {
        let permanent_key = self.resolver.qualified(PERMANENT_KEY);
        let until_save_key = self.resolver.qualified(UNTIL_SAVE_KEY);
        let mut permanent = self.global_list(&permanent_key);
        let mut until_save = self.global_list(&until_save_key);

        {
            let (target, other) = if until_save_only {
                (&mut until_save, &mut permanent)
            } else {
                (&mut permanent, &mut until_save)
            };
            other.retain(|c| c != code);
            if !target.iter().any(|c| c == code) {
                target.push(code.to_string());
            }
        }

        let store = self.resolver.store();
        if until_save_only {
            store.set(&until_save_key, SettingValue::List(until_save));
            store.set(&permanent_key, SettingValue::List(permanent));
        } else {
            store.set(&permanent_key, SettingValue::List(permanent));
            store.set(&until_save_key, SettingValue::List(until_save));
        }
    }

    /// Removes `code` from both lists.
    pub fn unignore(&self, code: &str) {
        let permanent_key = self.resolver.qualified(PERMANENT_KEY);
        let until_save_key = self.resolver.qualified(UNTIL_SAVE_KEY);
        let mut permanent = self.global_list(&permanent_key);
        let mut until_save = self.global_list(&until_save_key);
        permanent.retain(|c| c != code);
        until_save.retain(|c| c != code);

        let store = self.resolver.store();
        store.set(&until_save_key, SettingValue::List(until_save));
        store.set(&permanent_key, SettingValue::List(permanent));
    }

    /// Both lists as the given scope sees them.
    pub fn current_lists(&self, scope: Option<&str>) -> IgnoredCodes {
        let read = |key: &str| {
            self.resolver
                .resolve(&self.resolver.qualified(key), scope)
                .ok()
                .and_then(|value| value.as_list().map(<[String]>::to_vec))
                .unwrap_or_default()
        };
        IgnoredCodes {
            permanent: read(PERMANENT_KEY),
            until_save: read(UNTIL_SAVE_KEY),
        }
    }
}
