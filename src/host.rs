//! Traits the embedding editor host implements.
//!
//! The crate never talks to a real process, notification widget, or command
//! palette. Hosts hand in implementations of these traits; tests hand in
//! recording fakes. Process creation and stdio framing live entirely behind
//! [`ProcessTransport`].

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// RAII unsubscribe guard. Dropping it tears down whatever registration
/// produced it; dropping an already-consumed guard is a no-op.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// What a notification button does. Buttons are data, not closures; the host
/// decides how to honor the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Open this package's settings page.
    OpenPackageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeButton {
    pub text: String,
    pub action: ButtonAction,
}

/// Presentation details for a notification.
#[derive(Debug, Clone, Default)]
pub struct NoticeParams {
    /// Longer guidance text rendered under the headline.
    pub description: Option<String>,
    /// Raw failure detail, typically collapsed by the host.
    pub detail: Option<String>,
    pub buttons: Vec<NoticeButton>,
    /// Whether the user can close the notification themselves.
    pub dismissable: bool,
}

/// Handle to one displayed notification.
pub trait Notice: Send + Sync {
    /// Removes the notification. Safe to call more than once.
    fn dismiss(&self);
}

/// Host notification surface.
pub trait NotificationSink: Send + Sync {
    fn add_error(&self, message: &str, params: NoticeParams) -> Box<dyn Notice>;

    fn add_info(&self, message: &str, params: NoticeParams) -> Box<dyn Notice>;

    fn add_success(&self, message: &str, params: NoticeParams) -> Box<dyn Notice>;
}

/// How to launch the language server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    /// Interpreter executable, e.g. a `node` path.
    pub executable: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Transport-level happenings after a successful spawn, delivered on the
/// channel handed to [`ProcessTransport::spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Handshake finished; the server accepts requests.
    Initialized,
    /// Process ended. `Initialized` may or may not have preceded this.
    Exited { code: Option<i32> },
    /// Transport failure with the connection still nominally alive.
    Errored { detail: String },
}

/// Live connection to a spawned server.
#[async_trait]
pub trait ServerHandle: Send {
    /// `workspace/executeCommand` round-trip.
    async fn execute_command(
        &mut self,
        command: &str,
        arguments: Vec<serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value>;

    /// `workspace/didChangeConfiguration` push.
    async fn push_configuration(&mut self, settings: serde_json::Value) -> anyhow::Result<()>;

    /// Graceful shutdown; the transport may escalate to a kill internally.
    async fn stop(&mut self) -> anyhow::Result<()>;
}

/// Spawns server processes. `spawn` returns once the process exists; the
/// handshake outcome arrives later as a [`ServerEvent`].
pub trait ProcessTransport: Send + Sync {
    fn spawn(
        &self,
        launch: LaunchParams,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> anyhow::Result<Box<dyn ServerHandle>>;
}

pub type CommandHandler = Box<dyn Fn() + Send + Sync>;

/// Host command palette.
pub trait CommandRegistry: Send + Sync {
    fn register(&self, command: &str, handler: CommandHandler) -> Subscription;
}

/// Snapshot of one open document, taken by the host at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    /// Absent for unsaved buffers.
    pub path: Option<PathBuf>,
    /// Root grammar scope, e.g. `source.ts`.
    pub scope: String,
    /// Unsaved changes present.
    pub modified: bool,
}

impl DocumentState {
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            path: None,
            scope: scope.into(),
            modified: false,
        }
    }
}

/// Access to the host's editor state.
pub trait EditorContext: Send + Sync {
    fn active_document(&self) -> Option<DocumentState>;
}
