//! One-time settings namespace migration.
//!
//! The package shipped under a provisional name for a while; users carry
//! settings under that namespace. Before anything else reads settings, copy
//! them wholesale to the current namespace, clear the old one, and tell the
//! user. A namespace that already has values is never overwritten, and a
//! second run finds the old namespace empty and does nothing.

use crate::host::{NoticeParams, NotificationSink};
use crate::settings::SettingsStore;

pub fn migrate_namespace(
    store: &dyn SettingsStore,
    old_package: &str,
    new_package: &str,
    notifier: &dyn NotificationSink,
) {
    if old_package == new_package {
        return;
    }
    let Some(old_values) = store.get(old_package, None) else {
        return;
    };
    if store.get(new_package, None).is_some() {
        tracing::debug!("settings already exist under {new_package}; leaving {old_package} alone");
        return;
    }

    store.set(new_package, old_values);
    store.unset(old_package);
    tracing::info!("migrated settings from {old_package} to {new_package}");
    notifier.add_info(
        &format!("{new_package}: Migrated configuration"),
        NoticeParams {
            description: Some(format!("Settings were carried over from {old_package}.")),
            ..NoticeParams::default()
        },
    );
}
