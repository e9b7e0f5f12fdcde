//! Depth-first scheduler for one test

use chrono::Local;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::watchdog::{supervise, Watchdog};
use super::{EventError, EventResult, RunOutcome, ScriptLoader};
use crate::common::config::Config;
use crate::common::paths::resolve_relative;
use crate::common::{Error, Result};
use crate::driver::{Driver, DriverResult, Element};
use crate::event::{Capabilities, Category, Event, EventKind};
use crate::plugin::{PluginCatalog, PluginData, PluginPhase, PluginRegistry};
use crate::report::Reporter;
use crate::substitute::{substitute, HijackMap};
use crate::vars::Vars;

/// Format of the `stamp` variable
pub(super) const STAMP_FORMAT: &str = "%y%m%d_%H%M%S";
const CURRENT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Per-run settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Name handed to plugins
    pub test_name: String,
    pub watchdog_timeout: Duration,
    pub watchdog_poll: Duration,
    /// How long the driver may retry element lookups
    pub element_timeout: Duration,
    /// How long `attach` keeps looking for a window
    pub attach_timeout: Duration,
    /// Text that must not appear on pages checked with `assertpage`
    pub page_checks: Vec<String>,
    /// Seeded into the base scope as `global.<name>`
    pub globals: BTreeMap<String, String>,
    /// Directory that relative file names in events resolve against
    pub base_dir: Option<PathBuf>,
}

impl LoopSettings {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self::from_config(&Config::default(), test_name)
    }

    pub fn from_config(config: &Config, test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            watchdog_timeout: config.timeouts.watchdog(),
            watchdog_poll: config.timeouts.watchdog_poll(),
            element_timeout: config.timeouts.element(),
            attach_timeout: config.timeouts.attach(),
            page_checks: config.page_checks.clone(),
            globals: config.globals.clone(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

/// What undoing an event's context change after its children requires
#[derive(Debug)]
pub(super) enum Restore {
    Nothing,
    DefaultContent,
    Window(String),
}

/// Result of executing one event, before its children run
#[derive(Debug)]
pub(super) struct Executed {
    /// Parent element for the children
    pub element: Option<Element>,
    pub restore: Restore,
}

impl Executed {
    pub fn done() -> Self {
        Self {
            element: None,
            restore: Restore::Nothing,
        }
    }

    pub fn with_element(element: Element) -> Self {
        Self {
            element: Some(element),
            restore: Restore::Nothing,
        }
    }
}

/// Runs one event tree against a driver
pub struct EventLoop {
    pub(super) events: Vec<Event>,
    pub(super) driver: Arc<dyn Driver>,
    pub(super) reporter: Arc<dyn Reporter>,
    pub(super) hijacks: Arc<HijackMap>,
    pub(super) settings: LoopSettings,
    pub(super) plugins: PluginRegistry,
    pub(super) catalog: PluginCatalog,
    pub(super) loader: Option<Arc<dyn ScriptLoader>>,
    pub(super) vars: Vars,
    pub(super) watchdog: Arc<Watchdog>,
    pub(super) cancel: CancellationToken,
    /// Page text ignored by page checks, by name
    pub(super) whitelist: BTreeMap<String, String>,
    /// Elements saved by the `store` action
    pub(super) stored: HashMap<String, Element>,
    pub(super) current_window: Option<String>,
    /// File for the next `csv` event, set by `override`
    pub(super) csv_override: Option<String>,
}

impl EventLoop {
    pub fn new(
        events: Vec<Event>,
        driver: Arc<dyn Driver>,
        reporter: Arc<dyn Reporter>,
        settings: LoopSettings,
    ) -> Self {
        let mut vars = Vars::new();
        let now = Local::now();
        vars.put("stamp", now.format(STAMP_FORMAT).to_string());
        vars.put("currentdate", now.format(CURRENT_DATE_FORMAT).to_string());
        for (name, value) in &settings.globals {
            vars.put(format!("global.{}", name), value.clone());
        }

        Self {
            events,
            driver,
            reporter,
            hijacks: Arc::new(HijackMap::new()),
            watchdog: Arc::new(Watchdog::new(settings.watchdog_timeout)),
            settings,
            plugins: PluginRegistry::new(),
            catalog: PluginCatalog::new(),
            loader: None,
            vars,
            cancel: CancellationToken::new(),
            whitelist: BTreeMap::new(),
            stored: HashMap::new(),
            current_window: None,
            csv_override: None,
        }
    }

    pub fn with_hijacks(mut self, hijacks: Arc<HijackMap>) -> Self {
        self.hijacks = hijacks;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry, catalog: PluginCatalog) -> Self {
        self.plugins = plugins;
        self.catalog = catalog;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ScriptLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Variables as they stand before the run
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Start the worker and watchdog tasks
    pub fn spawn(self) -> RunHandle {
        let cancel = self.cancel.clone();
        let done = CancellationToken::new();
        let watchdog = self.watchdog.clone();
        watchdog.pulse();

        let supervisor = tokio::spawn(supervise(
            watchdog.clone(),
            cancel.clone(),
            done.clone(),
            self.settings.watchdog_poll,
        ));
        let worker = tokio::spawn(self.run());

        RunHandle {
            cancel,
            done,
            watchdog,
            worker,
            supervisor,
        }
    }

    /// Run to the end on the current task's runtime
    pub async fn run_to_end(self) -> RunOutcome {
        self.spawn().wait().await
    }

    async fn run(mut self) -> RunOutcome {
        tracing::info!(
            test = %self.settings.test_name,
            events = self.events.len(),
            "Test running"
        );
        self.reporter
            .log(&format!("Running test '{}'...", self.settings.test_name));

        let window = self.guarded(self.driver.current_window()).await;
        if let Ok(Ok(handle)) = window {
            self.current_window = Some(handle);
        }

        self.fire(PluginPhase::BeforeTest, None, None).await;

        let events = std::mem::take(&mut self.events);
        let result = self.process_events(&events, None).await;

        self.fire_after_test().await;

        match result {
            Err(err) => {
                tracing::error!(error = %err, "Run failed");
                RunOutcome::Failed(err.to_string())
            }
            Ok(()) if self.cancel.is_cancelled() => RunOutcome::Stopped,
            Ok(()) => RunOutcome::Completed,
        }
    }

    /// Run sibling events in order. An error means the run must end and has
    /// already been reported.
    pub(super) fn process_events<'a>(
        &'a mut self,
        events: &'a [Event],
        parent: Option<&'a Element>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            for event in events {
                if self.cancel.is_cancelled() {
                    tracing::debug!("Stop requested, skipping remaining events");
                    break;
                }
                self.handle_event(event, parent).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn handle_event(&mut self, event: &Event, parent: Option<&Element>) -> Result<()> {
        let name = event.name();
        self.reporter.log(&format!("{} event started...", name));
        self.watchdog.pulse();

        let mut element = None;
        match self.execute(event, parent).await {
            Ok(executed) => {
                element = executed.element.clone();
                if descends_into(event) {
                    self.process_events(event.children(), executed.element.as_ref())
                        .await?;
                }
                if let Err(err) = self.after_children(executed.restore).await {
                    self.report_failure(event, err)?;
                }
            }
            Err(err) => self.report_failure(event, err)?,
        }

        self.watchdog.pulse();
        self.reporter.log(&format!("{} event finished.", name));
        self.fire(PluginPhase::AfterEvent, Some(event), element.as_ref())
            .await;
        Ok(())
    }

    /// Report a failed event; returns the error if the run has to end
    fn report_failure(&self, event: &Event, err: EventError) -> Result<()> {
        match err {
            EventError::Abort => {
                self.reporter
                    .log(&format!("{} event aborted.", event.name()));
                Ok(())
            }
            EventError::ElementNotVisible => {
                if event.required() {
                    self.reporter.error("Element is not visible");
                } else {
                    self.reporter
                        .log("Element is not visible, but required = false");
                }
                Ok(())
            }
            EventError::Infra(err) => {
                self.reporter
                    .exception("Exception during event execution", &err);
                Ok(())
            }
            EventError::Fatal(err) => {
                self.reporter.exception("Browser session lost", &err);
                Err(err)
            }
            EventError::Halt(err) => Err(err),
        }
    }

    async fn execute(&mut self, event: &Event, parent: Option<&Element>) -> EventResult<Executed> {
        match event.kind() {
            EventKind::Frame => self.execute_frame(event, parent).await,
            kind if kind.category() == Category::Command => {
                self.execute_command(event, parent).await
            }
            _ => self.execute_element(event, parent).await,
        }
    }

    async fn after_children(&mut self, restore: Restore) -> EventResult<()> {
        match restore {
            Restore::Nothing => Ok(()),
            Restore::DefaultContent => {
                self.reporter.log("Switching back to default frame.");
                self.call(self.driver.switch_to_default_content()).await
            }
            Restore::Window(handle) => {
                self.reporter
                    .log(&format!("Switching back to window '{}'.", handle));
                self.call(self.driver.switch_to_window(&handle)).await?;
                self.current_window = Some(handle);
                Ok(())
            }
        }
    }

    /// Run plugins registered for `phase`, in registration order. Nothing
    /// runs once the run is stopped.
    pub(super) async fn fire(
        &self,
        phase: PluginPhase,
        event: Option<&Event>,
        element: Option<&Element>,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.dispatch(phase, event, element, &self.cancel).await;
    }

    /// Run `AfterTest` plugins, also when the run was stopped or the watchdog
    /// tripped. A stopped run gets a fresh token bounded by the watchdog
    /// timeout so teardown plugins can still reach the driver.
    async fn fire_after_test(&self) {
        let teardown = if self.cancel.is_cancelled() {
            CancellationToken::new()
        } else {
            self.cancel.clone()
        };
        let dispatch = self.dispatch(PluginPhase::AfterTest, None, None, &teardown);
        if tokio::time::timeout(self.settings.watchdog_timeout, dispatch)
            .await
            .is_err()
        {
            teardown.cancel();
            self.reporter.error(&format!(
                "{} plugins did not finish within {} seconds.",
                PluginPhase::AfterTest,
                self.settings.watchdog_timeout.as_secs()
            ));
        }
    }

    async fn dispatch(
        &self,
        phase: PluginPhase,
        event: Option<&Event>,
        element: Option<&Element>,
        cancel: &CancellationToken,
    ) {
        if self.plugins.is_empty() {
            return;
        }
        if !self.window_exists(cancel).await {
            self.reporter
                .log("Browser window closed. Skipping plugin execution.");
            return;
        }

        let data = PluginData {
            element,
            driver: self.driver.as_ref(),
            vars: &self.vars,
            hijacks: self.hijacks.as_ref(),
            test_name: &self.settings.test_name,
            args: &[],
        };

        for plugin in self.plugins.matching(phase, event.map(Event::name)) {
            tracing::debug!(plugin = plugin.name(), %phase, "Running plugin");
            match guard(cancel, plugin.execute(&data, self.reporter.as_ref())).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self
                    .reporter
                    .exception(&format!("Plugin '{}' failed", plugin.name()), &err),
                Err(_) => return,
            }
        }
    }

    async fn window_exists(&self, cancel: &CancellationToken) -> bool {
        match guard(cancel, self.driver.window_handles()).await {
            Ok(Ok(handles)) => match &self.current_window {
                Some(current) => handles.contains(current),
                None => !handles.is_empty(),
            },
            _ => false,
        }
    }

    /// Await `fut` unless the run is cancelled first
    pub(super) async fn guarded<F: Future>(&self, fut: F) -> EventResult<F::Output> {
        guard(&self.cancel, fut).await
    }

    /// Await a driver call unless the run is cancelled first
    pub(super) async fn call<T>(
        &self,
        fut: impl Future<Output = DriverResult<T>>,
    ) -> EventResult<T> {
        Ok(self.guarded(fut).await??)
    }

    pub(super) fn sub(&self, raw: &str) -> String {
        substitute(raw, &self.hijacks, &self.vars)
    }

    /// A string action with substitution applied
    pub(super) fn action(&self, event: &Event, name: &str) -> Option<String> {
        event.actions().get_str(name).map(|raw| self.sub(raw))
    }

    pub(super) fn require_action(&self, event: &Event, name: &str) -> EventResult<String> {
        self.action(event, name)
            .ok_or_else(|| missing(event, &format!("'{}' is required", name)))
    }

    pub(super) fn resolve_path(&self, raw: &str) -> PathBuf {
        resolve_relative(self.settings.base_dir.as_deref(), raw)
    }
}

async fn guard<F: Future>(cancel: &CancellationToken, fut: F) -> EventResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EventError::Abort),
        output = fut => Ok(output),
    }
}

fn descends_into(event: &Event) -> bool {
    event.has_children()
        && !event
            .kind()
            .capabilities()
            .contains(Capabilities::OWNS_CHILDREN)
}

pub(super) fn missing(event: &Event, message: &str) -> EventError {
    EventError::Infra(Error::missing_attribute(event.name(), message))
}

pub(super) fn invalid(attribute: &str, value: &str) -> EventError {
    EventError::Infra(Error::invalid_value(attribute, value))
}

/// Handle to a running [`EventLoop`]
pub struct RunHandle {
    cancel: CancellationToken,
    done: CancellationToken,
    watchdog: Arc<Watchdog>,
    worker: JoinHandle<RunOutcome>,
    supervisor: JoinHandle<()>,
}

impl RunHandle {
    /// Ask the run to stop; no further sibling events start
    pub fn stop(&self) {
        tracing::info!("Stop requested");
        self.cancel.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and the watchdog to finish
    pub async fn wait(self) -> RunOutcome {
        let outcome = match self.worker.await {
            Ok(outcome) => outcome,
            Err(err) => RunOutcome::Failed(format!("Worker task failed: {}", err)),
        };

        self.done.cancel();
        if let Err(err) = self.supervisor.await {
            tracing::warn!(error = %err, "Watchdog task failed");
        }

        if self.watchdog.is_tripped() {
            let err = Error::WatchdogExpired(self.watchdog.timeout().as_secs());
            return RunOutcome::Failed(err.to_string());
        }
        outcome
    }
}
