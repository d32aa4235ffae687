//! TypeScript language server integration for text editors.
//!
//! Resolves scoped editor settings, filters and decorates diagnostics,
//! adapts protocol payloads, and supervises the `tsserver` process with
//! debounced restarts on interpreter changes. [`TsClient`] ties it all
//! together; the traits in [`host`] are the seam an embedding editor
//! implements.

pub mod adapt;
pub mod client;
pub mod filter;
pub mod host;
pub mod ignore;
pub mod lifecycle;
pub mod migrate;
pub mod providers;
pub mod resolve;
pub mod schema;
pub mod server_config;
pub mod settings;
pub mod types;

/// Settings namespace this package owns.
pub const PACKAGE_NAME: &str = "tsbridge";

/// Namespace used by earlier releases; migrated on activation.
pub const PREVIOUS_PACKAGE_NAME: &str = "tsbridge-alpha";

pub use client::{HostServices, TsClient};
pub use filter::DiagnosticFilter;
pub use ignore::IgnoreLists;
pub use lifecycle::{ControllerHandle, LaunchConfig, ServerController, ServerState};
pub use providers::ProviderGates;
pub use resolve::{ResolveError, SettingsResolver};
pub use settings::{MemorySettings, SettingKind, SettingSchema, SettingValue, SettingsStore};
pub use types::{Diagnostic, DiagnosticSeverity, Point, Range, Suggestion, TextEdit};
