//! Test runner implementation
//!
//! Loads a script, runs it on an [`EventLoop`] and prints a colored result.

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use super::config::{TestScript, YamlScriptLoader};
use crate::common::config::Config;
use crate::common::Result;
use crate::driver::Driver;
use crate::event::{Event, EventFactory};
use crate::interp::{EventLoop, LoopSettings, RunOutcome};
use crate::plugin;
use crate::report::{Summary, TracingReporter};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub events_total: usize,
    pub outcome: RunOutcome,
    pub summary: Summary,
}

/// Load a script file and build its events
pub fn load_script(path: &Path, factory: &EventFactory) -> Result<(TestScript, Vec<Event>)> {
    let script = TestScript::load(path)?;
    let events = factory.build_all(&script.events)?;
    Ok((script, events))
}

/// Run a test script from a YAML file
pub async fn run_script(
    path: &Path,
    driver: Arc<dyn Driver>,
    factory: &EventFactory,
    config: &Config,
    verbose: bool,
) -> Result<TestResult> {
    let (script, events) = load_script(path, factory)?;
    let events_total: usize = events.iter().map(Event::count).sum();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        script.name.white().bold()
    );
    if let Some(desc) = &script.description {
        println!("  {}", desc.dimmed());
    }
    if verbose {
        println!("  File: {}", path.display().to_string().dimmed());
        println!("  Events: {}", events_total.to_string().dimmed());
    }

    let mut settings = LoopSettings::from_config(config, &script.name);
    if let Some(dir) = path.parent() {
        settings = settings.with_base_dir(dir);
    }

    let reporter = Arc::new(TracingReporter::new());
    let (registry, catalog) = plugin::from_config(&config.plugins);

    let handle = EventLoop::new(events, driver, reporter.clone(), settings)
        .with_hijacks(Arc::new(config.hijacks.clone()))
        .with_plugins(registry, catalog)
        .with_loader(Arc::new(YamlScriptLoader::new(factory.clone())))
        .spawn();

    let stop = handle.stop_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping test");
            stop.cancel();
        }
    });
    let outcome = handle.wait().await;
    interrupt.abort();

    let summary = reporter.summary();
    let passed = outcome.is_completed() && summary.passed();

    println!(
        "  Asserts: {} passed, {} failed",
        summary.asserts_passed.to_string().green(),
        summary.asserts_failed.to_string().red()
    );
    println!(
        "  Errors: {}  Exceptions: {}  Warnings: {}",
        summary.errors,
        summary.exceptions,
        summary.warnings
    );

    match &outcome {
        RunOutcome::Completed if passed => {
            println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold())
        }
        RunOutcome::Completed => {
            println!("\n{} {}\n", "✗".red().bold(), "Test Failed".red().bold())
        }
        RunOutcome::Stopped => {
            println!("\n{} {}\n", "✗".yellow().bold(), "Test Stopped".yellow().bold())
        }
        RunOutcome::Failed(reason) => println!(
            "\n{} {}: {}\n",
            "✗".red().bold(),
            "Test Failed".red().bold(),
            reason
        ),
    }

    Ok(TestResult {
        name: script.name,
        passed,
        events_total,
        outcome,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DryRunDriver;
    use crate::event::SchemaRegistry;
    use std::io::Write;

    fn factory() -> EventFactory {
        EventFactory::new(Arc::new(SchemaRegistry::builtin()))
    }

    #[tokio::test]
    async fn test_dry_run_passes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
name: Smoke
events:
  - tag: var
    attributes: { var: who, set: world }
  - tag: puts
    attributes: { txt: "hello {@who}" }
  - tag: div
    attributes: { id: main }
    children:
      - tag: button
        attributes: { id: go, click: true }
"#,
        )
        .unwrap();

        let result = run_script(
            file.path(),
            Arc::new(DryRunDriver::new()),
            &factory(),
            &Config::default(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(result.name, "Smoke");
        assert_eq!(result.events_total, 4);
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_failed_assert_fails_test() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"name: Assert\nevents:\n  - tag: browser\n    attributes: { assert: Welcome }\n",
        )
        .unwrap();

        let result = run_script(
            file.path(),
            Arc::new(DryRunDriver::new()),
            &factory(),
            &Config::default(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.summary.asserts_failed, 1);
        assert!(!result.passed);
    }

    #[test]
    fn test_load_script_rejects_bad_attribute() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name: Bad\nevents:\n  - tag: puts\n    attributes: { text: hi }\n")
            .unwrap();
        let err = load_script(file.path(), &factory()).unwrap_err();
        assert!(err.is_load_error());
    }
}
