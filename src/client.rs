//! Package facade: wires every component to the host.
//!
//! Activation order matters: the namespace migration runs before anything
//! else reads settings, then commands and settings watches are registered,
//! then the lifecycle controller starts. Deactivation unwinds in reverse.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::filter::DiagnosticFilter;
use crate::host::{
    CommandRegistry, EditorContext, NotificationSink, ProcessTransport, Subscription,
};
use crate::ignore::IgnoreLists;
use crate::lifecycle::{ControllerHandle, LaunchConfig, ServerController, ServerState};
use crate::migrate::migrate_namespace;
use crate::providers::ProviderGates;
use crate::resolve::SettingsResolver;
use crate::settings::SettingsStore;
use crate::{PACKAGE_NAME, PREVIOUS_PACKAGE_NAME};

/// Everything the host provides.
pub struct HostServices {
    pub settings: Arc<dyn SettingsStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub transport: Arc<dyn ProcessTransport>,
    pub commands: Arc<dyn CommandRegistry>,
    pub editor: Arc<dyn EditorContext>,
}

/// The scopes the package always attaches to.
const BASE_SCOPES: [&str; 2] = ["source.ts", "source.tsx"];

pub(crate) fn grammar_scopes_from(resolver: &SettingsResolver) -> Vec<String> {
    let mut scopes: Vec<String> = BASE_SCOPES.iter().map(|s| (*s).to_string()).collect();

    let include_js = resolver
        .resolve(&resolver.qualified("includeJavaScript"), None)
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    if include_js {
        scopes.push("source.js".to_string());
    }

    if let Ok(value) = resolver.resolve(&resolver.qualified("advanced.additionalScopes"), None) {
        if let Some(extra) = value.as_list() {
            scopes.extend(extra.iter().cloned());
        }
    }
    scopes
}

/// Live package instance.
pub struct TsClient {
    resolver: SettingsResolver,
    filter: DiagnosticFilter,
    gates: ProviderGates,
    controller: ControllerHandle,
    controller_task: Option<JoinHandle<()>>,
    subscriptions: Vec<Subscription>,
}

impl TsClient {
    /// Activates the package: migrates settings, registers commands and
    /// watches, and spawns the lifecycle controller onto the current
    /// runtime.
    #[must_use]
    pub fn activate(services: HostServices, launch: LaunchConfig) -> Self {
        migrate_namespace(
            services.settings.as_ref(),
            PREVIOUS_PACKAGE_NAME,
            PACKAGE_NAME,
            services.notifications.as_ref(),
        );

        let resolver = SettingsResolver::new(Arc::clone(&services.settings), PACKAGE_NAME);
        let filter = DiagnosticFilter::new(resolver.clone());
        let gates = ProviderGates::new(resolver.clone());

        let controller_owner = ServerController::new(
            resolver.clone(),
            Arc::clone(&services.notifications),
            Arc::clone(&services.transport),
            launch,
        );
        let controller = controller_owner.handle();
        let controller_task = tokio::spawn(controller_owner.run());

        let mut subscriptions = Vec::new();

        let start_handle = controller.clone();
        subscriptions.push(services.commands.register(
            &format!("{PACKAGE_NAME}:start-language-server"),
            Box::new(move || start_handle.request_start()),
        ));

        let organize_handle = controller.clone();
        let editor = Arc::clone(&services.editor);
        subscriptions.push(services.commands.register(
            &format!("{PACKAGE_NAME}:organize-imports"),
            Box::new(move || {
                // The document path is captured at invocation time.
                match editor.active_document().and_then(|doc| doc.path) {
                    Some(path) => organize_handle.organize_imports(path),
                    None => tracing::debug!("organize imports invoked without a saved document"),
                }
            }),
        ));

        let restart_handle = controller.clone();
        subscriptions.push(services.settings.on_change(
            &resolver.qualified("nodeBin"),
            Box::new(move || restart_handle.interpreter_changed()),
        ));

        let repush_handle = controller.clone();
        subscriptions.push(services.settings.on_change(
            &resolver.qualified("codeFormat.formattingRules"),
            Box::new(move || repush_handle.push_configuration()),
        ));

        Self {
            resolver,
            filter,
            gates,
            controller,
            controller_task: Some(controller_task),
            subscriptions,
        }
    }

    /// Asks the controller to start the server if it is not already up.
    pub fn start(&self) {
        self.controller.request_start();
    }

    /// Gracefully stops the server without deactivating the package.
    pub fn stop(&self) {
        self.controller.request_stop();
    }

    /// Tears the package down: drops watches and commands, stops the server,
    /// and waits for the controller to finish.
    pub async fn deactivate(mut self) {
        self.subscriptions.clear();
        self.controller.shutdown();
        if let Some(task) = self.controller_task.take() {
            if let Err(err) = task.await {
                tracing::debug!("controller task ended abnormally: {err}");
            }
        }
    }

    /// Grammar scopes this package attaches to, per current settings.
    #[must_use]
    pub fn grammar_scopes(&self) -> Vec<String> {
        grammar_scopes_from(&self.resolver)
    }

    #[must_use]
    pub fn server_state(&self) -> ServerState {
        self.controller.state()
    }

    #[must_use]
    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    #[must_use]
    pub fn filter(&self) -> &DiagnosticFilter {
        &self.filter
    }

    #[must_use]
    pub fn ignore_lists(&self) -> &IgnoreLists {
        self.filter.lists()
    }

    #[must_use]
    pub fn gates(&self) -> &ProviderGates {
        &self.gates
    }

    #[must_use]
    pub fn resolver(&self) -> &SettingsResolver {
        &self.resolver
    }
}
