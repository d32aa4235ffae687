//! Settings value model and the in-process store.
//!
//! The store holds one global value tree plus one override tree per grammar
//! scope. Keys are dotted paths addressing nodes in those trees; reading a
//! group key assembles whatever leaf writes exist beneath it. Layering
//! (scoped over global over schema default) is the resolver's job, so `get`
//! returns exactly one layer and never falls back on its own.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::host::Subscription;

/// Declared shape of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Boolean,
    Integer,
    String,
    List,
    Object,
}

/// One settings value. Lists are flat string lists; objects nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Object(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    #[must_use]
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::Bool(_) => SettingKind::Boolean,
            Self::Int(_) => SettingKind::Integer,
            Self::Str(_) => SettingKind::String,
            Self::List(_) => SettingKind::List,
            Self::Object(_) => SettingKind::Object,
        }
    }

    /// Builds an object value from key/value pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, SettingValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<SettingValue> for serde_json::Value {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Bool(b) => Self::Bool(b),
            SettingValue::Int(i) => Self::from(i),
            SettingValue::Str(s) => Self::String(s),
            SettingValue::List(items) => Self::Array(items.into_iter().map(Self::String).collect()),
            SettingValue::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Declared kind and default for one settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingSchema {
    pub kind: SettingKind,
    pub default: SettingValue,
}

impl SettingSchema {
    #[must_use]
    pub fn new(kind: SettingKind, default: SettingValue) -> Self {
        Self { kind, default }
    }
}

/// Fired after a write becomes visible; handlers re-read the store for the
/// new value.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Host settings store as seen by this crate.
///
/// `get` returns the requested layer only: the global tree when `scope` is
/// `None`, the named scope's override tree otherwise. Writes always target
/// the global layer. `on_change` fires for writes to the watched key, a
/// descendant of it, or an ancestor of it.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str, scope: Option<&str>) -> Option<SettingValue>;

    fn set(&self, key: &str, value: SettingValue);

    fn unset(&self, key: &str);

    fn schema(&self, key: &str) -> Option<SettingSchema>;

    fn on_change(&self, key: &str, callback: ChangeCallback) -> Subscription;
}

fn tree_get(map: &BTreeMap<String, SettingValue>, path: &str) -> Option<SettingValue> {
    match path.split_once('.') {
        None => map.get(path).cloned(),
        Some((head, rest)) => match map.get(head)? {
            SettingValue::Object(child) => tree_get(child, rest),
            _ => None,
        },
    }
}

fn tree_set(map: &mut BTreeMap<String, SettingValue>, path: &str, value: SettingValue) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| SettingValue::Object(BTreeMap::new()));
            // A leaf in the way of a deeper write is replaced by a group node.
            if !matches!(entry, SettingValue::Object(_)) {
                *entry = SettingValue::Object(BTreeMap::new());
            }
            if let SettingValue::Object(child) = entry {
                tree_set(child, rest, value);
            }
        }
    }
}

fn tree_unset(map: &mut BTreeMap<String, SettingValue>, path: &str) {
    match path.split_once('.') {
        None => {
            map.remove(path);
        }
        Some((head, rest)) => {
            if let Some(SettingValue::Object(child)) = map.get_mut(head) {
                tree_unset(child, rest);
                if child.is_empty() {
                    map.remove(head);
                }
            }
        }
    }
}

/// True when a write to `written` should wake a watcher on `watched`.
fn keys_overlap(watched: &str, written: &str) -> bool {
    watched == written
        || written
            .strip_prefix(watched)
            .is_some_and(|rest| rest.starts_with('.'))
        || watched
            .strip_prefix(written)
            .is_some_and(|rest| rest.starts_with('.'))
}

struct Watcher {
    id: u64,
    key: String,
    callback: Arc<dyn Fn() + Send + Sync>,
}

#[derive(Default)]
struct Layers {
    global: BTreeMap<String, SettingValue>,
    scoped: BTreeMap<String, BTreeMap<String, SettingValue>>,
}

/// Tree-backed [`SettingsStore`] used as the reference implementation and as
/// the double in every test. Callbacks run after the data lock is released,
/// so a handler can read (or write) the store again.
pub struct MemorySettings {
    schema: BTreeMap<String, SettingSchema>,
    layers: Mutex<Layers>,
    watchers: Arc<Mutex<Vec<Watcher>>>,
    next_watcher: AtomicU64,
}

impl MemorySettings {
    #[must_use]
    pub fn new(schema: BTreeMap<String, SettingSchema>) -> Self {
        Self {
            schema,
            layers: Mutex::new(Layers::default()),
            watchers: Arc::new(Mutex::new(Vec::new())),
            next_watcher: AtomicU64::new(0),
        }
    }

    /// Writes into one scope's override tree. Not part of the store trait:
    /// package code only writes globals, but hosts and tests seed overrides.
    pub fn set_scoped(&self, scope: &str, key: &str, value: SettingValue) {
        if let Ok(mut layers) = self.layers.lock() {
            tree_set(layers.scoped.entry(scope.to_string()).or_default(), key, value);
        }
        self.notify(key);
    }

    fn notify(&self, written: &str) {
        let callbacks: Vec<Arc<dyn Fn() + Send + Sync>> = match self.watchers.lock() {
            Ok(watchers) => watchers
                .iter()
                .filter(|w| keys_overlap(&w.key, written))
                .map(|w| Arc::clone(&w.callback))
                .collect(),
            Err(_) => Vec::new(),
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str, scope: Option<&str>) -> Option<SettingValue> {
        let layers = self.layers.lock().ok()?;
        match scope {
            Some(scope) => tree_get(layers.scoped.get(scope)?, key),
            None => tree_get(&layers.global, key),
        }
    }

    fn set(&self, key: &str, value: SettingValue) {
        if let Ok(mut layers) = self.layers.lock() {
            tree_set(&mut layers.global, key, value);
        }
        self.notify(key);
    }

    fn unset(&self, key: &str) {
        if let Ok(mut layers) = self.layers.lock() {
            tree_unset(&mut layers.global, key);
        }
        self.notify(key);
    }

    fn schema(&self, key: &str) -> Option<SettingSchema> {
        self.schema.get(key).cloned()
    }

    fn on_change(&self, key: &str, callback: ChangeCallback) -> Subscription {
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.push(Watcher {
                id,
                key: key.to_string(),
                callback: Arc::from(callback),
            });
        }
        let registry = Arc::clone(&self.watchers);
        Subscription::new(move || {
            if let Ok(mut watchers) = registry.lock() {
                watchers.retain(|w| w.id != id);
            }
        })
    }
}
