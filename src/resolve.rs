//! Scoped settings resolution.
//!
//! One read path for every consumer: look up the declared schema, read the
//! global and scope-override layers from the store, and combine them by kind.
//! Scalar and list kinds take the most specific layer wholesale; object kinds
//! shallow-merge, most specific layer winning key by key, over the schema
//! default.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::settings::{SettingKind, SettingValue, SettingsStore};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The key is not in the declared catalog. This is a bug in the caller,
    /// not a user-facing condition, so it surfaces instead of degrading.
    #[error("unknown setting key: {key}")]
    UnknownKey { key: String },

    /// The resolved value does not deserialize into the requested type.
    #[error("setting {key} does not match the requested shape")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Cheaply cloneable read facade over a [`SettingsStore`].
#[derive(Clone)]
pub struct SettingsResolver {
    store: Arc<dyn SettingsStore>,
    package: String,
}

impl SettingsResolver {
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>, package: impl Into<String>) -> Self {
        Self {
            store,
            package: package.into(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Full store key for a package-relative suffix.
    #[must_use]
    pub fn qualified(&self, suffix: &str) -> String {
        format!("{}.{suffix}", self.package)
    }

    /// Resolves one declared key against an optional grammar scope.
    pub fn resolve(&self, key: &str, scope: Option<&str>) -> Result<SettingValue, ResolveError> {
        let schema = self
            .store
            .schema(key)
            .ok_or_else(|| ResolveError::UnknownKey { key: key.to_string() })?;
        let global = self.store.get(key, None);
        let scoped = scope.and_then(|scope| self.store.get(key, Some(scope)));

        if schema.kind == SettingKind::Object {
            let mut merged = match schema.default {
                SettingValue::Object(map) => map,
                _ => BTreeMap::new(),
            };
            for layer in [global, scoped].into_iter().flatten() {
                if let SettingValue::Object(map) = layer {
                    merged.extend(map);
                }
            }
            Ok(SettingValue::Object(merged))
        } else {
            Ok(scoped.or(global).unwrap_or(schema.default))
        }
    }

    /// [`resolve`](Self::resolve), deserialized into a typed section struct.
    pub fn resolve_as<T: DeserializeOwned>(
        &self,
        key: &str,
        scope: Option<&str>,
    ) -> Result<T, ResolveError> {
        let value = self.resolve(key, scope)?;
        serde_json::from_value(serde_json::Value::from(value)).map_err(|source| {
            ResolveError::Shape {
                key: key.to_string(),
                source,
            }
        })
    }
}

impl fmt::Debug for SettingsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsResolver")
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}
