//! End-to-end tests for the event interpreter
//!
//! These tests run event trees against a recording driver and verify:
//! 1. Depth-first event order and parent elements
//! 2. Failure isolation between sibling events
//! 3. Plugin dispatch, variable scoping and hijacks
//! 4. Watchdog expiry, stop requests and fatal session loss

use async_trait::async_trait;
use std::collections::HashSet;
use std::error::Error as StdError;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use voodoo::driver::{Driver, DriverError, DriverResult, Element, FrameTarget, OptionTarget};
use voodoo::event::{Event, EventFactory, ScriptNode, SchemaRegistry};
use voodoo::interp::{EventLoop, LoopSettings, RunOutcome};
use voodoo::plugin::{Matcher, Plugin, PluginData, PluginPhase, PluginRegistry, Registration};
use voodoo::report::Reporter;
use voodoo::substitute::HijackMap;

/// Driver that records every call and finds elements by their `id`
#[derive(Default)]
struct MockDriver {
    calls: Mutex<Vec<String>>,
    /// Ids that are never found
    missing: HashSet<String>,
    /// Ids whose click reports the element as not visible
    hidden: HashSet<String>,
    /// Ids whose lookup never completes
    hanging: HashSet<String>,
    /// Ids whose click loses the browser session
    lost: HashSet<String>,
}

impl MockDriver {
    fn new() -> Self {
        Self::default()
    }

    fn missing(mut self, id: &str) -> Self {
        self.missing.insert(id.to_string());
        self
    }

    fn hidden(mut self, id: &str) -> Self {
        self.hidden.insert(id.to_string());
        self
    }

    fn hanging(mut self, id: &str) -> Self {
        self.hanging.insert(id.to_string());
        self
    }

    fn lost(mut self, id: &str) -> Self {
        self.lost.insert(id.to_string());
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_starting(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn find_element(
        &self,
        selectors: &[(String, String)],
        parent: Option<&Element>,
        _timeout: Duration,
    ) -> DriverResult<Element> {
        let id = selectors
            .iter()
            .find(|(name, _)| name == "id")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        let tag = selectors
            .iter()
            .find(|(name, _)| name == "html_tag")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();

        match parent {
            Some(parent) => self.record(format!("find:{}@{}", id, parent.id)),
            None => self.record(format!("find:{}", id)),
        }

        if self.hanging.contains(&id) {
            std::future::pending::<()>().await;
        }
        if self.missing.contains(&id) {
            return Err(DriverError::NoSuchElement(format!("id={}", id)));
        }
        Ok(Element::new(id, tag))
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        self.record(format!("click:{}", element.id));
        if self.hidden.contains(&element.id) {
            return Err(DriverError::ElementNotVisible);
        }
        if self.lost.contains(&element.id) {
            return Err(DriverError::SessionLost("browser crashed".to_string()));
        }
        Ok(())
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        Ok(format!("text of {}", element.id))
    }

    async fn value(&self, element: &Element) -> DriverResult<String> {
        Ok(format!("value of {}", element.id))
    }

    async fn set_value(&self, element: &Element, value: &str) -> DriverResult<()> {
        self.record(format!("set:{}={}", element.id, value));
        Ok(())
    }

    async fn append_value(&self, element: &Element, value: &str) -> DriverResult<()> {
        self.record(format!("append:{}={}", element.id, value));
        Ok(())
    }

    async fn clear(&self, element: &Element) -> DriverResult<()> {
        self.record(format!("clear:{}", element.id));
        Ok(())
    }

    async fn is_selected(&self, _element: &Element) -> DriverResult<bool> {
        Ok(false)
    }

    async fn is_enabled(&self, _element: &Element) -> DriverResult<bool> {
        Ok(true)
    }

    async fn select_option(&self, element: &Element, option: &OptionTarget) -> DriverResult<()> {
        self.record(format!("select:{}={:?}", element.id, option));
        Ok(())
    }

    async fn fire_event(&self, element: &Element, event: &str) -> DriverResult<()> {
        self.record(format!("fire:{}={}", element.id, event));
        Ok(())
    }

    async fn switch_to_frame(&self, target: &FrameTarget) -> DriverResult<()> {
        self.record(format!("frame:{:?}", target));
        Ok(())
    }

    async fn switch_to_default_content(&self) -> DriverResult<()> {
        self.record("default_content".to_string());
        Ok(())
    }

    async fn window_handles(&self) -> DriverResult<Vec<String>> {
        Ok(vec!["main".to_string()])
    }

    async fn current_window(&self) -> DriverResult<String> {
        Ok("main".to_string())
    }

    async fn switch_to_window(&self, handle: &str) -> DriverResult<()> {
        self.record(format!("window:{}", handle));
        Ok(())
    }

    async fn title(&self) -> DriverResult<String> {
        Ok("Mock".to_string())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok("about:blank".to_string())
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.record(format!("navigate:{}", url));
        Ok(())
    }

    async fn back(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn forward(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn refresh(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn page_source(&self) -> DriverResult<String> {
        Ok("<html><body>Welcome</body></html>".to_string())
    }

    async fn execute_script(&self, _script: &str) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn alert_text(&self) -> DriverResult<String> {
        Err(DriverError::NoAlert)
    }

    async fn accept_alert(&self) -> DriverResult<()> {
        Err(DriverError::NoAlert)
    }

    async fn dismiss_alert(&self) -> DriverResult<()> {
        Err(DriverError::NoAlert)
    }

    async fn drag_and_drop(&self, source: &Element, target: &Element) -> DriverResult<()> {
        self.record(format!("dnd:{}->{}", source.id, target.id));
        Ok(())
    }
}

/// Reporter that keeps everything it is told
#[derive(Default)]
struct RecordingReporter {
    logs: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    exceptions: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn log(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.logs.lock().unwrap().push(format!("WARN {}", message));
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn exception(&self, message: &str, error: &(dyn StdError + 'static)) {
        self.exceptions
            .lock()
            .unwrap()
            .push(format!("{}: {}", message, error));
    }

    fn assert(&self, expected: &str, haystack: &str) -> bool {
        let passed = haystack.contains(expected);
        if !passed {
            self.error(&format!("Assert failed: '{}'", expected));
        }
        passed
    }

    fn assert_not(&self, unexpected: &str, haystack: &str) -> bool {
        let passed = !haystack.contains(unexpected);
        if !passed {
            self.error(&format!("Assert not failed: '{}'", unexpected));
        }
        passed
    }
}

/// Plugin that appends its name to a shared log
struct RecordingPlugin {
    name: String,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, data: &PluginData<'_>, _reporter: &dyn Reporter) -> voodoo::Result<()> {
        let element = data.element.map(|e| e.id.as_str()).unwrap_or("-");
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, element));
        Ok(())
    }
}

fn build(nodes: &[ScriptNode]) -> Vec<Event> {
    EventFactory::new(Arc::new(SchemaRegistry::builtin()))
        .build_all(nodes)
        .expect("script should be valid")
}

fn div(id: &str) -> ScriptNode {
    ScriptNode::new("div").attr("id", id)
}

fn puts(text: &str) -> ScriptNode {
    ScriptNode::new("puts").attr("txt", text)
}

struct Run {
    outcome: RunOutcome,
    driver: Arc<MockDriver>,
    reporter: Arc<RecordingReporter>,
}

async fn run_with(
    nodes: &[ScriptNode],
    driver: MockDriver,
    settings: LoopSettings,
    configure: impl FnOnce(EventLoop) -> EventLoop,
) -> Run {
    let driver = Arc::new(driver);
    let reporter = Arc::new(RecordingReporter::default());
    let event_loop = EventLoop::new(build(nodes), driver.clone(), reporter.clone(), settings);
    let outcome = configure(event_loop).run_to_end().await;
    Run {
        outcome,
        driver,
        reporter,
    }
}

async fn run(nodes: &[ScriptNode], driver: MockDriver) -> Run {
    run_with(nodes, driver, LoopSettings::new("test"), |l| l).await
}

// ============== Ordering ==============

#[tokio::test]
async fn test_depth_first_order() {
    // A(B(D), C)
    let script = [div("a").child(div("b").child(div("d"))).child(div("c"))];
    let run = run(&script, MockDriver::new()).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        run.driver.calls_starting("find:"),
        vec!["find:a", "find:b@a", "find:d@b", "find:c@a"]
    );

    let logs = run.reporter.logs();
    let started: Vec<_> = logs
        .iter()
        .filter(|l| l.ends_with("event started..."))
        .collect();
    assert_eq!(started.len(), 4);
}

#[tokio::test]
async fn test_missing_element_skips_children_only() {
    let script = [
        div("gone").child(div("child")),
        div("sibling").attr("click", "true"),
    ];
    let run = run(&script, MockDriver::new().missing("gone")).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        run.driver.calls_starting("find:"),
        vec!["find:gone", "find:sibling"]
    );
    assert!(run.driver.calls().contains(&"click:sibling".to_string()));
    assert_eq!(run.reporter.errors().len(), 1);
    assert!(run.reporter.errors()[0].contains("id=gone"));
}

#[tokio::test]
async fn test_optional_missing_element_is_not_an_error() {
    let script = [div("gone").attr("required", "false"), puts("after")];
    let run = run(&script, MockDriver::new().missing("gone")).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert!(run.reporter.errors().is_empty());
    assert!(run.reporter.logs().contains(&"after".to_string()));
}

#[tokio::test]
async fn test_not_visible_respects_required() {
    let script = [
        ScriptNode::new("button")
            .attr("id", "ghost")
            .attr("click", "true")
            .attr("required", "false"),
        ScriptNode::new("button")
            .attr("id", "ghost")
            .attr("click", "true"),
    ];
    let run = run(&script, MockDriver::new().hidden("ghost")).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(run.reporter.errors(), vec!["Element is not visible"]);
    assert!(run
        .reporter
        .logs()
        .iter()
        .any(|l| l.contains("required = false")));
}

#[tokio::test]
async fn test_after_children_runs_before_next_sibling() {
    // A(B(D), C) with A and B as frames, so each after-children step shows up
    let script = [ScriptNode::new("frame")
        .attr("name", "a")
        .child(ScriptNode::new("frame").attr("name", "b").child(div("d")))
        .child(div("c"))];
    let run = run(&script, MockDriver::new()).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        run.driver.calls(),
        vec![
            "frame:Name(\"a\")",
            "frame:Name(\"b\")",
            "find:d",
            "default_content",
            "find:c",
            "default_content",
        ]
    );
}

#[tokio::test]
async fn test_nested_abort_keeps_siblings_and_restore() {
    let script = [ScriptNode::new("frame")
        .attr("name", "content")
        .child(div("b").child(div("d").child(div("under-d"))).child(div("x")))
        .child(div("c"))];
    let run = run(&script, MockDriver::new().missing("d")).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        run.driver.calls(),
        vec![
            "frame:Name(\"content\")",
            "find:b",
            "find:d@b",
            "find:x@b",
            "find:c",
            "default_content",
        ]
    );
    assert!(run.reporter.logs().contains(&"div event aborted.".to_string()));
    assert_eq!(run.reporter.errors().len(), 1);
}

#[tokio::test]
async fn test_frame_restores_default_content() {
    let script = [ScriptNode::new("frame")
        .attr("name", "content")
        .child(div("inner"))];
    let run = run(&script, MockDriver::new()).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        run.driver.calls(),
        vec![
            "frame:Name(\"content\")".to_string(),
            "find:inner".to_string(),
            "default_content".to_string(),
        ]
    );
}

// ============== Variables ==============

#[tokio::test]
async fn test_hijack_wins_over_script_var() {
    let script = [
        ScriptNode::new("var").attr("var", "who").attr("set", "script"),
        ScriptNode::new("var").attr("var", "site").attr("set", "example.com"),
        puts("{@who} at {@site}"),
    ];
    let mut hijacks = HijackMap::new();
    hijacks.insert("who".to_string(), "hijacked".to_string());

    let run = run_with(&script, MockDriver::new(), LoopSettings::new("test"), |l| {
        l.with_hijacks(Arc::new(hijacks))
    })
    .await;

    assert!(run
        .reporter
        .logs()
        .contains(&"hijacked at example.com".to_string()));
}

#[tokio::test]
async fn test_element_value_into_var() {
    let script = [
        ScriptNode::new("textfield")
            .attr("id", "user")
            .attr("var", "username"),
        ScriptNode::new("textfield")
            .attr("id", "copy")
            .attr("set", "{@username}!"),
    ];
    let run = run(&script, MockDriver::new()).await;

    assert!(run
        .driver
        .calls()
        .contains(&"set:copy=value of user!".to_string()));
}

#[tokio::test]
async fn test_csv_rows_get_their_own_scope() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("users.csv")).unwrap();
    writeln!(file, "name,role").unwrap();
    writeln!(file, "alice,admin").unwrap();
    writeln!(file, "\"bob, jr\",viewer").unwrap();

    let script = [
        ScriptNode::new("csv")
            .attr("file", "users.csv")
            .attr("var", "user")
            .child(puts("{@user.name} is {@user.role}")),
        puts("after {@user.name}"),
    ];
    let settings = LoopSettings::new("test").with_base_dir(dir.path());
    let run = run_with(&script, MockDriver::new(), settings, |l| l).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    let logs = run.reporter.logs();
    assert!(logs.contains(&"alice is admin".to_string()));
    assert!(logs.contains(&"bob, jr is viewer".to_string()));
    assert!(logs.contains(&"after {@user.name}".to_string()));
}

// ============== Plugins ==============

#[tokio::test]
async fn test_plugins_run_in_registration_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let plugin = |name: &str| -> Arc<dyn Plugin> {
        Arc::new(RecordingPlugin {
            name: name.to_string(),
            seen: seen.clone(),
        })
    };

    let mut registry = PluginRegistry::new();
    registry.register(Registration::new(
        Matcher::new(PluginPhase::BeforeTest),
        plugin("setup"),
    ));
    registry.register(Registration::new(
        Matcher::new(PluginPhase::AfterEvent).with_elements(["button"]),
        plugin("first"),
    ));
    registry.register(Registration::new(
        Matcher::new(PluginPhase::AfterEvent).with_elements(["button"]),
        plugin("second"),
    ));
    registry.register(Registration::new(
        Matcher::new(PluginPhase::AfterClick),
        plugin("clicked"),
    ));

    let script = [
        div("page"),
        ScriptNode::new("button")
            .attr("id", "go")
            .attr("click", "true"),
    ];
    let run = run_with(&script, MockDriver::new(), LoopSettings::new("test"), |l| {
        l.with_plugins(registry, Default::default())
    })
    .await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["setup:-", "clicked:go", "first:go", "second:go"]
    );
}

// ============== Watchdog, stop and fatal errors ==============

#[tokio::test(start_paused = true)]
async fn test_watchdog_fails_hanging_run() {
    let mut settings = LoopSettings::new("test");
    settings.watchdog_timeout = Duration::from_secs(5);
    settings.watchdog_poll = Duration::from_secs(1);

    let script = [div("stuck"), puts("never")];
    let run = run_with(&script, MockDriver::new().hanging("stuck"), settings, |l| l).await;

    match &run.outcome {
        RunOutcome::Failed(reason) => assert!(reason.contains("5"), "{}", reason),
        other => panic!("Expected watchdog failure, got {:?}", other),
    }
    assert!(!run.reporter.logs().contains(&"never".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_wait_extends_watchdog() {
    let mut settings = LoopSettings::new("test");
    settings.watchdog_timeout = Duration::from_secs(5);
    settings.watchdog_poll = Duration::from_secs(1);

    let script = [ScriptNode::new("wait").attr("timeout", "8"), puts("done")];
    let run = run_with(&script, MockDriver::new(), settings, |l| l).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert!(run.reporter.logs().contains(&"done".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_run() {
    let driver = Arc::new(MockDriver::new().hanging("stuck"));
    let reporter = Arc::new(RecordingReporter::default());
    let events = build(&[div("stuck"), puts("never")]);

    let handle = EventLoop::new(events, driver.clone(), reporter.clone(), LoopSettings::new("test"))
        .spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    handle.stop();
    assert_eq!(handle.wait().await, RunOutcome::Stopped);
    assert!(!reporter.logs().contains(&"never".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_stop_inside_nested_events() {
    let driver = Arc::new(MockDriver::new().hanging("stuck"));
    let reporter = Arc::new(RecordingReporter::default());
    let events = build(&[
        div("a").child(div("stuck")).child(div("c")),
        div("after"),
    ]);

    let handle = EventLoop::new(events, driver.clone(), reporter.clone(), LoopSettings::new("test"))
        .spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop();

    assert_eq!(handle.wait().await, RunOutcome::Stopped);
    assert_eq!(driver.calls_starting("find:"), vec!["find:a", "find:stuck@a"]);
}

#[tokio::test(start_paused = true)]
async fn test_after_test_plugins_run_on_stopped_run() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = PluginRegistry::new();
    registry.register(Registration::new(
        Matcher::new(PluginPhase::AfterTest),
        Arc::new(RecordingPlugin {
            name: "teardown".to_string(),
            seen: seen.clone(),
        }),
    ));
    registry.register(Registration::new(
        Matcher::new(PluginPhase::AfterEvent),
        Arc::new(RecordingPlugin {
            name: "event".to_string(),
            seen: seen.clone(),
        }),
    ));

    let driver = Arc::new(MockDriver::new().hanging("stuck"));
    let reporter = Arc::new(RecordingReporter::default());
    let handle = EventLoop::new(
        build(&[div("stuck")]),
        driver,
        reporter,
        LoopSettings::new("test"),
    )
    .with_plugins(registry, Default::default())
    .spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop();

    assert_eq!(handle.wait().await, RunOutcome::Stopped);
    assert_eq!(*seen.lock().unwrap(), vec!["teardown:-"]);
}

#[tokio::test(start_paused = true)]
async fn test_huge_wait_keeps_watchdog_alive() {
    let mut settings = LoopSettings::new("test");
    settings.watchdog_timeout = Duration::from_secs(5);
    settings.watchdog_poll = Duration::from_secs(1);

    let driver = Arc::new(MockDriver::new());
    let reporter = Arc::new(RecordingReporter::default());
    let events = build(&[ScriptNode::new("wait").attr("timeout", &u64::MAX.to_string())]);
    let handle = EventLoop::new(events, driver, reporter, settings).spawn();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!handle.is_finished());
    handle.stop();
    assert_eq!(handle.wait().await, RunOutcome::Stopped);
}

#[tokio::test]
async fn test_session_loss_is_fatal() {
    let script = [
        div("form").child(
            ScriptNode::new("button")
                .attr("id", "boom")
                .attr("click", "true"),
        ),
        puts("never"),
    ];
    let run = run(&script, MockDriver::new().lost("boom")).await;

    assert!(matches!(run.outcome, RunOutcome::Failed(_)));
    assert!(!run.reporter.logs().contains(&"never".to_string()));
    // Reported once, by the event that lost the session
    assert_eq!(run.reporter.exceptions().len(), 1);
}
