//! Server lifecycle: start, supersede, debounce, error surface.
//!
//! One controller owns the server handle, the error notification, and the
//! restart timer. Every input (commands, settings watches, timer fires,
//! transport events) arrives as a message on a single channel and is applied
//! by one owner, so observers always see whole transitions. An epoch counter
//! stamps timers and server events; anything carrying an old epoch belongs to
//! a superseded startup and is dropped on receipt.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::host::{
    ButtonAction, LaunchParams, Notice, NoticeButton, NoticeParams, NotificationSink,
    ProcessTransport, ServerEvent, ServerHandle,
};
use crate::resolve::SettingsResolver;
use crate::server_config;

/// Quiet period between an interpreter-path change and the restart it causes.
pub const RESTART_QUIET_PERIOD: Duration = Duration::from_millis(1000);

const SERVER_NAME: &str = "TypeScript";
const ORGANIZE_IMPORTS_COMMAND: &str = "_typescript.organizeImports";
const START_FAILURE_GUIDANCE: &str = "Make sure Node 18 or newer is installed, or point the \
    nodeBin setting at a working Node executable.";

/// Lifecycle states as published to the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Errored {
        detail: String,
    },
}

impl ServerState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Errored { .. } => "errored",
        }
    }
}

/// Where the server's entry script lives and where to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub server_entry: PathBuf,
    pub cwd: PathBuf,
}

/// At most one scheduled task. Cancelling with nothing scheduled is a no-op;
/// scheduling replaces whatever was pending.
#[derive(Debug, Default)]
pub struct Debounce {
    task: Option<JoinHandle<()>>,
}

impl Debounce {
    pub fn schedule<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}

enum ControlMsg {
    StartRequested,
    StopRequested,
    InterpreterChanged,
    RestartDue { epoch: u64 },
    Server { epoch: u64, event: ServerEvent },
    PushConfiguration,
    OrganizeImports { path: PathBuf },
    Shutdown,
}

/// Cloneable sender half of the controller, used by command handlers and
/// settings watches. Sends after shutdown are silently dropped.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMsg>,
    state: watch::Receiver<ServerState>,
}

impl ControllerHandle {
    pub fn request_start(&self) {
        let _ = self.tx.send(ControlMsg::StartRequested);
    }

    pub fn request_stop(&self) {
        let _ = self.tx.send(ControlMsg::StopRequested);
    }

    pub fn interpreter_changed(&self) {
        let _ = self.tx.send(ControlMsg::InterpreterChanged);
    }

    pub fn push_configuration(&self) {
        let _ = self.tx.send(ControlMsg::PushConfiguration);
    }

    pub fn organize_imports(&self, path: PathBuf) {
        let _ = self.tx.send(ControlMsg::OrganizeImports { path });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(ControlMsg::Shutdown);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    /// Watch stream of state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }
}

/// Owns the language server lifecycle described in the module docs.
pub struct ServerController {
    resolver: SettingsResolver,
    notifier: Arc<dyn NotificationSink>,
    transport: Arc<dyn ProcessTransport>,
    launch: LaunchConfig,
    tx: mpsc::UnboundedSender<ControlMsg>,
    rx: mpsc::UnboundedReceiver<ControlMsg>,
    state: ServerState,
    state_tx: watch::Sender<ServerState>,
    server: Option<Box<dyn ServerHandle>>,
    error_note: Option<Box<dyn Notice>>,
    restart_timer: Debounce,
    epoch: u64,
    /// False while inside the restart quiet period.
    listening: bool,
    /// A start was wanted while not listening; honored when listening resumes.
    pending_start: bool,
}

impl ServerController {
    #[must_use]
    pub fn new(
        resolver: SettingsResolver,
        notifier: Arc<dyn NotificationSink>,
        transport: Arc<dyn ProcessTransport>,
        launch: LaunchConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _state_rx) = watch::channel(ServerState::Stopped);
        Self {
            resolver,
            notifier,
            transport,
            launch,
            tx,
            rx,
            state: ServerState::Stopped,
            state_tx,
            server: None,
            error_note: None,
            restart_timer: Debounce::default(),
            epoch: 0,
            listening: true,
            pending_start: false,
        }
    }

    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    /// Processes messages until `shutdown` arrives.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            let quit = matches!(msg, ControlMsg::Shutdown);
            self.apply(msg).await;
            if quit {
                break;
            }
        }
    }

    /// Applies everything already queued without waiting for more. Test
    /// drivers alternate this with yields to the runtime.
    pub async fn pump(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg).await;
        }
    }

    async fn apply(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::StartRequested => self.on_start_requested(),
            ControlMsg::StopRequested => self.stop_server().await,
            ControlMsg::InterpreterChanged => self.on_interpreter_changed(),
            ControlMsg::RestartDue { epoch } => self.on_restart_due(epoch),
            ControlMsg::Server { epoch, event } => self.on_server_event(epoch, event).await,
            ControlMsg::PushConfiguration => self.push_configuration().await,
            ControlMsg::OrganizeImports { path } => self.organize_imports(path).await,
            ControlMsg::Shutdown => self.teardown().await,
        }
    }

    fn set_state(&mut self, next: ServerState) {
        if self.state != next {
            tracing::debug!("server state {} -> {}", self.state.label(), next.label());
        }
        self.state = next.clone();
        self.state_tx.send_replace(next);
    }

    fn on_start_requested(&mut self) {
        if !self.listening {
            self.pending_start = true;
            return;
        }
        match self.state {
            ServerState::Stopped | ServerState::Errored { .. } => self.start_server(),
            ServerState::Starting | ServerState::Running => {}
        }
    }

    fn start_server(&mut self) {
        let epoch = self.epoch;
        let launch = self.launch_params();
        tracing::info!("starting {SERVER_NAME} language server via {}", launch.executable);
        self.set_state(ServerState::Starting);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        match self.transport.spawn(launch, event_tx) {
            Ok(handle) => {
                self.server = Some(handle);
                let ctl = self.tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = event_rx.recv().await {
                        if ctl.send(ControlMsg::Server { epoch, event }).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(err) => {
                let message = format!(
                    "{}: {SERVER_NAME} language server cannot start",
                    self.resolver.package()
                );
                self.fail_with_notice(message, Some(START_FAILURE_GUIDANCE), format!("{err:#}"));
            }
        }
    }

    fn launch_params(&self) -> LaunchParams {
        LaunchParams {
            executable: self.interpreter_path(),
            args: vec![
                self.launch.server_entry.display().to_string(),
                "--stdio".to_string(),
            ],
            cwd: self.launch.cwd.clone(),
        }
    }

    /// Configured `nodeBin`, falling back to a bare `node` when unset or
    /// blank.
    fn interpreter_path(&self) -> String {
        let key = self.resolver.qualified("nodeBin");
        match self.resolver.resolve(&key, None) {
            Ok(value) => match value.as_str() {
                Some(path) if !path.is_empty() => path.to_string(),
                _ => "node".to_string(),
            },
            Err(err) => {
                tracing::warn!("interpreter path unresolvable: {err}");
                "node".to_string()
            }
        }
    }

    /// Replaces (never stacks) the persistent error notification and moves
    /// into `Errored`.
    fn fail_with_notice(&mut self, message: String, description: Option<&str>, detail: String) {
        tracing::warn!("{message}: {detail}");
        if let Some(old) = self.error_note.take() {
            old.dismiss();
        }
        let params = NoticeParams {
            description: description.map(str::to_string),
            detail: Some(detail.clone()),
            buttons: vec![NoticeButton {
                text: "Open Settings".to_string(),
                action: ButtonAction::OpenPackageSettings,
            }],
            dismissable: true,
        };
        self.error_note = Some(self.notifier.add_error(&message, params));
        self.set_state(ServerState::Errored { detail });
    }

    fn on_interpreter_changed(&mut self) {
        tracing::info!(
            "interpreter path changed; {SERVER_NAME} language server restarts after the quiet period"
        );
        self.listening = false;
        if !matches!(self.state, ServerState::Stopped) {
            self.pending_start = true;
        }
        self.epoch += 1;
        self.discard_server();
        if matches!(self.state, ServerState::Starting | ServerState::Running) {
            self.set_state(ServerState::Stopped);
        }
        let tx = self.tx.clone();
        let epoch = self.epoch;
        self.restart_timer.schedule(RESTART_QUIET_PERIOD, async move {
            let _ = tx.send(ControlMsg::RestartDue { epoch });
        });
    }

    /// Detached graceful stop; the controller does not wait for the outcome.
    fn discard_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            tokio::spawn(async move {
                if let Err(err) = server.stop().await {
                    tracing::debug!("discarded server refused graceful stop: {err:#}");
                }
            });
        }
    }

    fn on_restart_due(&mut self, epoch: u64) {
        if epoch != self.epoch {
            tracing::debug!("ignoring stale restart timer (epoch {epoch})");
            return;
        }
        self.listening = true;
        if std::mem::take(&mut self.pending_start) {
            self.start_server();
        }
    }

    async fn on_server_event(&mut self, epoch: u64, event: ServerEvent) {
        if epoch != self.epoch {
            tracing::debug!("ignoring event from superseded server: {event:?}");
            return;
        }
        match event {
            ServerEvent::Initialized => self.on_initialized().await,
            ServerEvent::Exited { code } => {
                let detail = match code {
                    Some(code) => format!("server process exited with status {code}"),
                    None => "server process exited".to_string(),
                };
                self.on_connection_lost(detail);
            }
            ServerEvent::Errored { detail } => self.on_connection_lost(detail),
        }
    }

    async fn on_initialized(&mut self) {
        tracing::info!("{SERVER_NAME} language server started");
        self.set_state(ServerState::Running);
        if let Some(note) = self.error_note.take() {
            note.dismiss();
            let message = format!(
                "{}: {SERVER_NAME} language server started",
                self.resolver.package()
            );
            self.notifier.add_success(&message, NoticeParams::default());
        }
        self.push_configuration().await;
    }

    fn on_connection_lost(&mut self, detail: String) {
        match self.state {
            ServerState::Starting => {
                self.discard_server();
                let message = format!(
                    "{}: {SERVER_NAME} language server cannot start",
                    self.resolver.package()
                );
                self.fail_with_notice(message, Some(START_FAILURE_GUIDANCE), detail);
            }
            ServerState::Running => {
                self.discard_server();
                let message = format!(
                    "{}: {SERVER_NAME} language server stopped unexpectedly",
                    self.resolver.package()
                );
                self.fail_with_notice(message, None, detail);
            }
            ServerState::Stopped | ServerState::Errored { .. } => {
                tracing::debug!("server event while {}: {detail}", self.state.label());
            }
        }
    }

    async fn push_configuration(&mut self) {
        if !matches!(self.state, ServerState::Running) {
            return;
        }
        let bundle = server_config::configuration_bundle(&self.resolver);
        if let Some(server) = self.server.as_mut() {
            if let Err(err) = server.push_configuration(bundle).await {
                tracing::warn!("configuration push failed: {err:#}");
            }
        }
    }

    async fn organize_imports(&mut self, path: PathBuf) {
        if !matches!(self.state, ServerState::Running) {
            tracing::debug!("organize imports ignored while {}", self.state.label());
            return;
        }
        let Some(server) = self.server.as_mut() else {
            return;
        };
        let args = vec![serde_json::Value::String(path.display().to_string())];
        if let Err(err) = server.execute_command(ORGANIZE_IMPORTS_COMMAND, args).await {
            tracing::warn!("organize imports failed: {err:#}");
        }
    }

    /// Awaited graceful stop. Keeps `Errored` visible so the user still sees
    /// what broke; every other state lands on `Stopped`. An explicit stop
    /// also supersedes a pending interpreter-change restart, so starts
    /// requested afterwards are honored immediately.
    async fn stop_server(&mut self) {
        self.epoch += 1;
        self.restart_timer.cancel();
        self.listening = true;
        self.pending_start = false;
        if let Some(mut server) = self.server.take() {
            if let Err(err) = server.stop().await {
                tracing::debug!("graceful stop failed: {err:#}");
            }
        }
        if !matches!(self.state, ServerState::Errored { .. }) {
            self.set_state(ServerState::Stopped);
        }
    }

    async fn teardown(&mut self) {
        tracing::debug!("lifecycle controller shutting down");
        self.restart_timer.cancel();
        self.epoch += 1;
        self.pending_start = false;
        if let Some(mut server) = self.server.take() {
            if let Err(err) = server.stop().await {
                tracing::debug!("graceful stop during shutdown failed: {err:#}");
            }
        }
        if let Some(note) = self.error_note.take() {
            note.dismiss();
        }
        self.set_state(ServerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::package_schema;
    use crate::settings::{MemorySettings, SettingValue, SettingsStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::task::yield_now;
    use tokio::time::advance;

    struct FakeNotice {
        dismissed: Arc<AtomicBool>,
    }

    impl Notice for FakeNotice {
        fn dismiss(&self) {
            self.dismissed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        errors: Mutex<Vec<(String, NoticeParams, Arc<AtomicBool>)>>,
        successes: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn error_count(&self) -> usize {
            self.errors.lock().unwrap().len()
        }

        fn error_dismissed(&self, index: usize) -> bool {
            self.errors.lock().unwrap()[index].2.load(Ordering::SeqCst)
        }

        fn success_count(&self) -> usize {
            self.successes.lock().unwrap().len()
        }
    }

    impl NotificationSink for RecordingSink {
        fn add_error(&self, message: &str, params: NoticeParams) -> Box<dyn Notice> {
            let dismissed = Arc::new(AtomicBool::new(false));
            self.errors
                .lock()
                .unwrap()
                .push((message.to_string(), params, Arc::clone(&dismissed)));
            Box::new(FakeNotice { dismissed })
        }

        fn add_info(&self, _message: &str, _params: NoticeParams) -> Box<dyn Notice> {
            Box::new(FakeNotice {
                dismissed: Arc::new(AtomicBool::new(false)),
            })
        }

        fn add_success(&self, message: &str, _params: NoticeParams) -> Box<dyn Notice> {
            self.successes.lock().unwrap().push(message.to_string());
            Box::new(FakeNotice {
                dismissed: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum SpawnPlan {
        /// `spawn` itself fails.
        Fail,
        /// Spawn succeeds, handshake never completes.
        Silent,
        /// Spawn succeeds and `Initialized` is delivered immediately.
        Initialize,
    }

    #[derive(Default)]
    struct Recorded {
        stops: AtomicUsize,
        pushes: Mutex<Vec<serde_json::Value>>,
        commands: Mutex<Vec<(String, Vec<serde_json::Value>)>>,
    }

    struct FakeTransport {
        plan: Mutex<SpawnPlan>,
        launches: Mutex<Vec<LaunchParams>>,
        event_senders: Mutex<Vec<mpsc::UnboundedSender<ServerEvent>>>,
        recorded: Arc<Recorded>,
    }

    impl FakeTransport {
        fn new(plan: SpawnPlan) -> Self {
            Self {
                plan: Mutex::new(plan),
                launches: Mutex::new(Vec::new()),
                event_senders: Mutex::new(Vec::new()),
                recorded: Arc::new(Recorded::default()),
            }
        }

        fn set_plan(&self, plan: SpawnPlan) {
            *self.plan.lock().unwrap() = plan;
        }

        fn launch_count(&self) -> usize {
            self.launches.lock().unwrap().len()
        }

        fn launch(&self, index: usize) -> LaunchParams {
            self.launches.lock().unwrap()[index].clone()
        }

        fn event_sender(&self, index: usize) -> mpsc::UnboundedSender<ServerEvent> {
            self.event_senders.lock().unwrap()[index].clone()
        }
    }

    struct FakeHandle {
        recorded: Arc<Recorded>,
    }

    #[async_trait]
    impl ServerHandle for FakeHandle {
        async fn execute_command(
            &mut self,
            command: &str,
            arguments: Vec<serde_json::Value>,
        ) -> anyhow::Result<serde_json::Value> {
            self.recorded
                .commands
                .lock()
                .unwrap()
                .push((command.to_string(), arguments));
            Ok(serde_json::Value::Null)
        }

        async fn push_configuration(&mut self, settings: serde_json::Value) -> anyhow::Result<()> {
            self.recorded.pushes.lock().unwrap().push(settings);
            Ok(())
        }

        async fn stop(&mut self) -> anyhow::Result<()> {
            self.recorded.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl ProcessTransport for FakeTransport {
        fn spawn(
            &self,
            launch: LaunchParams,
            events: mpsc::UnboundedSender<ServerEvent>,
        ) -> anyhow::Result<Box<dyn ServerHandle>> {
            self.launches.lock().unwrap().push(launch);
            let plan = *self.plan.lock().unwrap();
            if plan == SpawnPlan::Fail {
                anyhow::bail!("spawning node failed: ENOENT");
            }
            if plan == SpawnPlan::Initialize {
                let _ = events.send(ServerEvent::Initialized);
            }
            self.event_senders.lock().unwrap().push(events);
            Ok(Box::new(FakeHandle {
                recorded: Arc::clone(&self.recorded),
            }))
        }
    }

    struct Rig {
        controller: ServerController,
        handle: ControllerHandle,
        store: Arc<MemorySettings>,
        sink: Arc<RecordingSink>,
        transport: Arc<FakeTransport>,
    }

    fn rig(plan: SpawnPlan) -> Rig {
        let store = Arc::new(MemorySettings::new(package_schema("pkg")));
        let resolver =
            SettingsResolver::new(Arc::clone(&store) as Arc<dyn SettingsStore>, "pkg");
        let sink = Arc::new(RecordingSink::default());
        let transport = Arc::new(FakeTransport::new(plan));
        let controller = ServerController::new(
            resolver,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::clone(&transport) as Arc<dyn ProcessTransport>,
            LaunchConfig {
                server_entry: PathBuf::from("/srv/tsserver/cli.js"),
                cwd: PathBuf::from("/project"),
            },
        );
        let handle = controller.handle();
        Rig {
            controller,
            handle,
            store,
            sink,
            transport,
        }
    }

    /// Lets spawned forwarder and timer tasks run between drains.
    async fn settle(controller: &mut ServerController) {
        for _ in 0..4 {
            controller.pump().await;
            yield_now().await;
        }
        controller.pump().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_initialize_runs_and_pushes_configuration() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        assert_eq!(rig.handle.state(), ServerState::Running);
        assert_eq!(rig.transport.launch_count(), 1);
        let pushes = rig.transport.recorded.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].get("typescript").is_some());
        // A clean first start is not an error recovery.
        assert_eq!(rig.sink.success_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_requests_do_not_spawn_twice() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        assert_eq!(rig.transport.launch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_raises_a_persistent_error_notice() {
        let mut rig = rig(SpawnPlan::Fail);
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        assert!(matches!(rig.handle.state(), ServerState::Errored { .. }));
        assert_eq!(rig.sink.error_count(), 1);
        let errors = rig.sink.errors.lock().unwrap();
        let (message, params, _) = &errors[0];
        assert_eq!(message, "pkg: TypeScript language server cannot start");
        assert!(params.dismissable);
        assert!(params.description.as_deref().is_some_and(|d| d.contains("nodeBin")));
        assert!(params.detail.as_deref().is_some_and(|d| d.contains("ENOENT")));
        assert_eq!(params.buttons.len(), 1);
        assert_eq!(params.buttons[0].action, ButtonAction::OpenPackageSettings);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_replace_the_notice_instead_of_stacking() {
        let mut rig = rig(SpawnPlan::Fail);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        assert_eq!(rig.sink.error_count(), 2);
        assert!(rig.sink.error_dismissed(0));
        assert!(!rig.sink.error_dismissed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn later_success_dismisses_the_error_and_acknowledges_once() {
        let mut rig = rig(SpawnPlan::Fail);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.sink.error_count(), 1);

        rig.transport.set_plan(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        assert_eq!(rig.handle.state(), ServerState::Running);
        assert!(rig.sink.error_dismissed(0));
        assert_eq!(rig.sink.success_count(), 1);
        let successes = rig.sink.successes.lock().unwrap();
        assert_eq!(successes[0], "pkg: TypeScript language server started");
    }

    #[tokio::test(start_paused = true)]
    async fn interpreter_changes_debounce_to_a_single_restart() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 1);

        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;
        advance(Duration::from_millis(500)).await;
        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;

        // 999 ms after the second change: still waiting.
        advance(Duration::from_millis(999)).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 1);
        assert_eq!(rig.handle.state(), ServerState::Stopped);

        advance(Duration::from_millis(1)).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 2);
        assert_eq!(rig.handle.state(), ServerState::Running);
        // The superseded server was told to stop.
        assert!(rig.transport.recorded.stops.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_fires_are_ignored() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;
        // A fire from an already-cancelled timer generation arrives anyway.
        rig.controller.apply(ControlMsg::RestartDue { epoch: 0 }).await;
        assert_eq!(rig.transport.launch_count(), 1);
        assert_eq!(rig.handle.state(), ServerState::Stopped);
        // It must not have reopened the quiet period either.
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 1);

        advance(RESTART_QUIET_PERIOD).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_a_superseded_server_are_discarded() {
        let mut rig = rig(SpawnPlan::Silent);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Starting);

        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;
        // The abandoned startup finally answers; nobody cares.
        let _ = rig.transport.event_sender(0).send(ServerEvent::Initialized);
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Stopped);
        assert_eq!(rig.sink.success_count(), 0);

        advance(RESTART_QUIET_PERIOD).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 2);
        assert_eq!(rig.handle.state(), ServerState::Starting);
    }

    #[tokio::test(start_paused = true)]
    async fn crash_while_running_raises_the_error_notice() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Running);

        let _ = rig
            .transport
            .event_sender(0)
            .send(ServerEvent::Exited { code: Some(1) });
        settle(&mut rig.controller).await;

        assert!(matches!(rig.handle.state(), ServerState::Errored { .. }));
        let errors = rig.sink.errors.lock().unwrap();
        assert_eq!(errors[0].0, "pkg: TypeScript language server stopped unexpectedly");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_dismisses_the_notice_and_cancels_the_timer() {
        let mut rig = rig(SpawnPlan::Fail);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;

        rig.handle.shutdown();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Stopped);
        assert!(rig.sink.error_dismissed(0));

        // The pending restart never happens.
        advance(Duration::from_millis(2000)).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_shuts_the_running_server() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        rig.handle.request_stop();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Stopped);
        assert_eq!(rig.transport.recorded.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_the_quiet_period_still_allows_a_later_start() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Running);

        rig.handle.interpreter_changed();
        settle(&mut rig.controller).await;
        rig.handle.request_stop();
        settle(&mut rig.controller).await;
        assert_eq!(rig.handle.state(), ServerState::Stopped);

        // The explicit stop superseded the debounced restart.
        advance(Duration::from_millis(2000)).await;
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 1);
        assert_eq!(rig.handle.state(), ServerState::Stopped);

        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch_count(), 2);
        assert_eq!(rig.handle.state(), ServerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn organize_imports_runs_only_against_a_running_server() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.organize_imports(PathBuf::from("/project/a.ts"));
        settle(&mut rig.controller).await;
        assert!(rig.transport.recorded.commands.lock().unwrap().is_empty());

        rig.handle.request_start();
        settle(&mut rig.controller).await;
        rig.handle.organize_imports(PathBuf::from("/project/a.ts"));
        settle(&mut rig.controller).await;

        let commands = rig.transport.recorded.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "_typescript.organizeImports");
        assert_eq!(commands[0].1, vec![serde_json::Value::from("/project/a.ts")]);
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_repush_reaches_only_a_running_server() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.handle.push_configuration();
        settle(&mut rig.controller).await;
        assert!(rig.transport.recorded.pushes.lock().unwrap().is_empty());

        rig.handle.request_start();
        settle(&mut rig.controller).await;
        rig.handle.push_configuration();
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.recorded.pushes.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_params_use_the_configured_interpreter() {
        let mut rig = rig(SpawnPlan::Initialize);
        rig.store
            .set("pkg.nodeBin", SettingValue::from("/opt/node/bin/node"));
        rig.handle.request_start();
        settle(&mut rig.controller).await;

        let launch = rig.transport.launch(0);
        assert_eq!(launch.executable, "/opt/node/bin/node");
        assert_eq!(launch.args, vec!["/srv/tsserver/cli.js", "--stdio"]);
        assert_eq!(launch.cwd, PathBuf::from("/project"));

        rig.handle.request_stop();
        settle(&mut rig.controller).await;
        rig.store.set("pkg.nodeBin", SettingValue::from(""));
        rig.handle.request_start();
        settle(&mut rig.controller).await;
        assert_eq!(rig.transport.launch(1).executable, "node");
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_replaces_and_cancels_cleanly() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debounce::default();
        // Cancelling with nothing scheduled is fine.
        debounce.cancel();
        assert!(!debounce.is_scheduled());

        let counted = Arc::clone(&fired);
        debounce.schedule(Duration::from_millis(100), async move {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        yield_now().await;
        let counted = Arc::clone(&fired);
        debounce.schedule(Duration::from_millis(100), async move {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debounce.is_scheduled());
        // The sleep arms when the spawned task first polls; park it before
        // moving the clock.
        yield_now().await;

        advance(Duration::from_millis(150)).await;
        yield_now().await;
        // Only the replacement ran.
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let counted = Arc::clone(&fired);
        debounce.schedule(Duration::from_millis(100), async move {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        yield_now().await;
        debounce.cancel();
        advance(Duration::from_millis(150)).await;
        yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
