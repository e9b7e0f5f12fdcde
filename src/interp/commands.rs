//! Control events: variables, navigation, files, processes and plugins

use chrono::Local;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

use super::event_loop::{invalid, missing, EventLoop, Executed, Restore, STAMP_FORMAT};
use super::{EventError, EventResult};
use crate::common::Error;
use crate::driver::{DriverError, Element};
use crate::event::{Event, EventKind};
use crate::plugin::PluginData;

/// Seconds a `wait` event sleeps without a `timeout`
const DEFAULT_WAIT_SECS: u64 = 5;

/// Pause between window scans while attaching
const ATTACH_RETRY: Duration = Duration::from_secs(1);

/// Stand-in deadline for timeouts too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}

impl EventLoop {
    pub(super) async fn execute_command(
        &mut self,
        event: &Event,
        parent: Option<&Element>,
    ) -> EventResult<Executed> {
        match event.kind() {
            EventKind::Alert => self.alert(event).await,
            EventKind::Arg => Ok(Executed::done()),
            EventKind::Attach => self.attach(event).await,
            EventKind::Browser => self.browser(event).await,
            EventKind::Csv => self.csv(event, parent).await,
            EventKind::Delete => self.delete(event),
            EventKind::Dnd => self.drag_and_drop(event).await,
            EventKind::Execute => self.execute_process(event).await,
            EventKind::Javaplugin => self.invoke_plugin(event, parent).await,
            EventKind::Javascript => self.javascript(event).await,
            EventKind::Pluginloader => self.load_plugin(event),
            EventKind::Puts => self.puts(event),
            EventKind::Savehtml => self.save_html(event).await,
            EventKind::Screenshot => self.screenshot(event).await,
            EventKind::Script => self.script(event, parent).await,
            EventKind::Timestamp => self.timestamp(),
            EventKind::Var => self.var(event),
            EventKind::Wait => self.wait(event).await,
            EventKind::Whitelist => self.whitelist(event),
            other => Err(EventError::Infra(Error::Internal(format!(
                "'{}' is not a command event",
                other
            )))),
        }
    }

    async fn alert(&mut self, event: &Event) -> EventResult<Executed> {
        let actions = event.actions();
        let text = match self.guarded(self.driver.alert_text()).await? {
            Ok(text) => Some(text),
            Err(DriverError::NoAlert) => None,
            Err(err) => return Err(err.into()),
        };

        if let Some(expected) = actions.get_bool("exists") {
            if text.is_some() != expected {
                self.reporter.error(&format!(
                    "Alert dialog {} present, expected exists = {}",
                    if text.is_some() { "is" } else { "is not" },
                    expected
                ));
                return Err(EventError::Abort);
            }
        }

        let Some(text) = text else {
            if actions.get_bool("exists") == Some(false) {
                self.reporter.log("No alert dialog present, as expected.");
                return Ok(Executed::done());
            }
            self.reporter.error("No alert dialog found.");
            return Err(EventError::Abort);
        };

        if let Some(expected) = self.action(event, "assert") {
            self.reporter.assert(&expected, &text);
        }

        match actions.get_bool("alert") {
            Some(true) => {
                self.reporter.log("Accepting alert dialog.");
                self.call(self.driver.accept_alert()).await?;
            }
            Some(false) => {
                self.reporter.log("Dismissing alert dialog.");
                self.call(self.driver.dismiss_alert()).await?;
            }
            None => {}
        }
        Ok(Executed::done())
    }

    async fn attach(&mut self, event: &Event) -> EventResult<Executed> {
        let selectors = event.selectors();
        let title = selectors.get_str("title").map(|raw| self.sub(raw));
        let url = selectors.get_str("url").map(|raw| self.sub(raw));
        let index = match selectors.get_str("index").map(|raw| self.sub(raw)) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("index", &raw))?,
            ),
            None => None,
        };
        if title.is_none() && url.is_none() && index.is_none() {
            return Err(missing(event, "one of 'title', 'url' or 'index' is required"));
        }

        let previous = self.call(self.driver.current_window()).await?;
        let deadline = deadline_after(self.settings.attach_timeout);
        self.watchdog.extend(self.settings.attach_timeout);

        loop {
            if let Some(handle) = self
                .find_window(title.as_deref(), url.as_deref(), index)
                .await?
            {
                self.reporter
                    .log(&format!("Attached to window '{}'.", handle));
                self.current_window = Some(handle);
                return Ok(Executed {
                    element: None,
                    restore: Restore::Window(previous),
                });
            }
            if Instant::now() >= deadline {
                break;
            }
            self.guarded(tokio::time::sleep(ATTACH_RETRY)).await?;
        }

        self.call(self.driver.switch_to_window(&previous)).await?;
        let wanted = title
            .map(|t| format!("title '{}'", t))
            .or_else(|| url.map(|u| format!("url '{}'", u)))
            .or_else(|| index.map(|i| format!("index {}", i)))
            .unwrap_or_default();
        self.reporter
            .error(&format!("Failed to find window matching {}.", wanted));
        Err(EventError::Abort)
    }

    /// Switch to the first window matching; leaves the focus on the last
    /// window examined when none match
    async fn find_window(
        &self,
        title: Option<&str>,
        url: Option<&str>,
        index: Option<usize>,
    ) -> EventResult<Option<String>> {
        let handles = self.call(self.driver.window_handles()).await?;

        if let Some(index) = index {
            let Some(handle) = handles.get(index) else {
                return Ok(None);
            };
            self.call(self.driver.switch_to_window(handle)).await?;
            return Ok(Some(handle.clone()));
        }

        for handle in &handles {
            self.call(self.driver.switch_to_window(handle)).await?;
            if let Some(title) = title {
                if self.call(self.driver.title()).await?.contains(title) {
                    return Ok(Some(handle.clone()));
                }
            }
            if let Some(url) = url {
                if self.call(self.driver.current_url()).await?.contains(url) {
                    return Ok(Some(handle.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn browser(&mut self, event: &Event) -> EventResult<Executed> {
        let url = self.action(event, "url");

        match self.action(event, "action").map(|a| a.to_ascii_lowercase()) {
            Some(action) => match action.as_str() {
                "url" => {
                    let url = url
                        .clone()
                        .ok_or_else(|| missing(event, "'url' is required for action 'url'"))?;
                    self.navigate(&url).await?;
                }
                "back" => {
                    self.reporter.log("Browser back.");
                    self.call(self.driver.back()).await?;
                }
                "forward" => {
                    self.reporter.log("Browser forward.");
                    self.call(self.driver.forward()).await?;
                }
                "refresh" => {
                    self.reporter.log("Browser refresh.");
                    self.call(self.driver.refresh()).await?;
                }
                "close" => self.close_window().await?,
                other => return Err(invalid("action", other)),
            },
            None => {
                if let Some(url) = &url {
                    self.navigate(url).await?;
                }
            }
        }

        let assert = self.action(event, "assert");
        let assert_not = self.action(event, "assertnot");
        if assert.is_some() || assert_not.is_some() {
            let source = self.call(self.driver.page_source()).await?;
            if let Some(expected) = assert {
                self.reporter.assert(&expected, &source);
            }
            if let Some(unexpected) = assert_not {
                self.reporter.assert_not(&unexpected, &source);
            }
        }

        if event.actions().get_bool("assertpage") == Some(true) {
            self.check_page().await?;
        }
        Ok(Executed::done())
    }

    async fn navigate(&self, url: &str) -> EventResult<()> {
        self.reporter.log(&format!("Opening url '{}'.", url));
        self.call(self.driver.navigate(url)).await
    }

    /// Close the current window and move to the first remaining one
    async fn close_window(&mut self) -> EventResult<()> {
        self.reporter.log("Closing browser window.");
        self.call(self.driver.close()).await?;

        let handles = self.call(self.driver.window_handles()).await?;
        match handles.into_iter().next() {
            Some(next) => {
                self.call(self.driver.switch_to_window(&next)).await?;
                self.current_window = Some(next);
            }
            None => self.current_window = None,
        }
        Ok(())
    }

    /// Report every configured page check found on the current page,
    /// ignoring whitelisted text
    pub(super) async fn check_page(&self) -> EventResult<()> {
        let mut source = self.call(self.driver.page_source()).await?;
        for (name, text) in &self.whitelist {
            if !text.is_empty() && source.contains(text.as_str()) {
                tracing::debug!(whitelist = %name, "Ignoring whitelisted text");
                source = source.replace(text.as_str(), "");
            }
        }
        for check in &self.settings.page_checks {
            if source.contains(check.as_str()) {
                self.reporter
                    .error(&format!("Page check failed: found '{}'.", check));
            }
        }
        Ok(())
    }

    async fn csv(&mut self, event: &Event, parent: Option<&Element>) -> EventResult<Executed> {
        if let Some(file) = self.action(event, "override") {
            self.reporter
                .log(&format!("Next csv event will read '{}'.", file));
            self.csv_override = Some(file);
            return Ok(Executed::done());
        }

        let file = match self.csv_override.take() {
            Some(file) => file,
            None => self.require_action(event, "file")?,
        };
        let prefix = self
            .action(event, "var")
            .unwrap_or_else(|| "csv".to_string());
        let path = self.resolve_path(&file);

        let content = self
            .guarded(tokio::fs::read_to_string(&path))
            .await?
            .map_err(|e| EventError::Infra(Error::file_read(&path, e)))?;
        let table = CsvTable::parse(&content);
        self.reporter.log(&format!(
            "Processing csv file '{}' with {} rows.",
            path.display(),
            table.rows.len()
        ));

        for row in &table.rows {
            if self.cancel.is_cancelled() {
                break;
            }
            self.vars.push();
            for (i, header) in table.headers.iter().enumerate() {
                let value = row.get(i).cloned().unwrap_or_default();
                self.vars.put(format!("{}.{}", prefix, header), value);
            }
            let result = self.process_events(event.children(), parent).await;
            self.vars.pop()?;
            result.map_err(EventError::Halt)?;
        }
        Ok(Executed::done())
    }

    fn delete(&mut self, event: &Event) -> EventResult<Executed> {
        let name = self.require_action(event, "name")?;
        match self.vars.remove(&name) {
            Some(_) => self.reporter.log(&format!("Deleted var '{}'.", name)),
            None => self
                .reporter
                .warning(&format!("Var '{}' does not exist.", name)),
        }
        Ok(Executed::done())
    }

    async fn drag_and_drop(&mut self, event: &Event) -> EventResult<Executed> {
        let source_name = self.require_action(event, "src")?;
        let target_name = self.require_action(event, "dst")?;

        let (Some(source), Some(target)) = (
            self.stored.get(&source_name),
            self.stored.get(&target_name),
        ) else {
            self.reporter.error(&format!(
                "Drag and drop needs stored elements '{}' and '{}'.",
                source_name, target_name
            ));
            return Err(EventError::Abort);
        };

        self.reporter.log(&format!(
            "Dragging '{}' onto '{}'.",
            source_name, target_name
        ));
        self.call(self.driver.drag_and_drop(source, target)).await?;
        Ok(Executed::done())
    }

    async fn execute_process(&mut self, event: &Event) -> EventResult<Executed> {
        let args: Vec<String> = event.args().iter().map(|arg| self.sub(arg)).collect();
        let Some((program, rest)) = args.split_first() else {
            return Err(missing(event, "at least one 'arg' is required"));
        };
        self.reporter
            .log(&format!("Executing process: {}", args.join(" ")));

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = self
            .guarded(command.output())
            .await?
            .map_err(|e| {
                EventError::Infra(Error::Process {
                    command: program.clone(),
                    message: e.to_string(),
                })
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            self.reporter.log(line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EventError::Infra(Error::Process {
                command: program.clone(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            }));
        }
        Ok(Executed::done())
    }

    async fn invoke_plugin(
        &mut self,
        event: &Event,
        parent: Option<&Element>,
    ) -> EventResult<Executed> {
        let name = self.require_action(event, "classname")?;
        let Some(registration) = self.catalog.get(&name) else {
            self.reporter
                .error(&format!("No plugin named '{}' is available.", name));
            return Err(EventError::Abort);
        };
        let plugin = registration.plugin.clone();
        let args: Vec<String> = event.args().iter().map(|arg| self.sub(arg)).collect();

        let data = PluginData {
            element: parent,
            driver: self.driver.as_ref(),
            vars: &self.vars,
            hijacks: self.hijacks.as_ref(),
            test_name: &self.settings.test_name,
            args: &args,
        };
        self.reporter.log(&format!("Running plugin '{}'.", name));
        self.guarded(plugin.execute(&data, self.reporter.as_ref()))
            .await??;
        Ok(Executed::done())
    }

    fn load_plugin(&mut self, event: &Event) -> EventResult<Executed> {
        let name = self.require_action(event, "classname")?;
        let Some(registration) = self.catalog.get(&name).cloned() else {
            self.reporter
                .error(&format!("No plugin named '{}' is available.", name));
            return Err(EventError::Abort);
        };
        self.reporter.log(&format!(
            "Loaded plugin '{}' for {} events.",
            name, registration.matcher.phase
        ));
        self.plugins.register(registration);
        Ok(Executed::done())
    }

    async fn javascript(&mut self, event: &Event) -> EventResult<Executed> {
        let script = match (self.action(event, "file"), self.action(event, "content")) {
            (Some(file), _) => {
                let path = self.resolve_path(&file);
                let text = self
                    .guarded(tokio::fs::read_to_string(&path))
                    .await?
                    .map_err(|e| EventError::Infra(Error::file_read(&path, e)))?;
                self.sub(&text)
            }
            (None, Some(content)) => content,
            (None, None) => return Err(missing(event, "'file' or script text is required")),
        };

        self.reporter.log("Executing javascript.");
        let result = self.call(self.driver.execute_script(&script)).await?;
        self.reporter
            .log(&format!("Javascript result: '{}'.", result));
        Ok(Executed::done())
    }

    fn puts(&mut self, event: &Event) -> EventResult<Executed> {
        let text = self.require_action(event, "txt")?;
        self.reporter.log(&text);
        Ok(Executed::done())
    }

    async fn save_html(&mut self, event: &Event) -> EventResult<Executed> {
        let path = self.resolve_path(&self.require_action(event, "file")?);
        let source = self.call(self.driver.page_source()).await?;
        self.guarded(tokio::fs::write(&path, source))
            .await?
            .map_err(|e| EventError::Infra(Error::Io(e)))?;
        self.reporter
            .log(&format!("Saved page source to '{}'.", path.display()));
        Ok(Executed::done())
    }

    async fn screenshot(&mut self, event: &Event) -> EventResult<Executed> {
        let path = self.resolve_path(&self.require_action(event, "file")?);
        let image = self.call(self.driver.screenshot()).await?;
        self.guarded(tokio::fs::write(&path, image))
            .await?
            .map_err(|e| EventError::Infra(Error::Io(e)))?;
        self.reporter
            .log(&format!("Saved screenshot to '{}'.", path.display()));
        Ok(Executed::done())
    }

    async fn script(&mut self, event: &Event, parent: Option<&Element>) -> EventResult<Executed> {
        let path = self.resolve_path(&self.require_action(event, "file")?);
        let Some(loader) = self.loader.clone() else {
            return Err(EventError::Infra(Error::Config(
                "No script loader is available for 'script' events".to_string(),
            )));
        };

        let events = self.guarded(loader.load(&path)).await??;
        self.reporter
            .log(&format!("Running script '{}'.", path.display()));
        self.process_events(&events, parent)
            .await
            .map_err(EventError::Halt)?;
        Ok(Executed::done())
    }

    fn timestamp(&mut self) -> EventResult<Executed> {
        let stamp = Local::now().format(STAMP_FORMAT).to_string();
        self.reporter.log(&format!("Setting stamp to '{}'.", stamp));
        self.vars.put("stamp", stamp);
        Ok(Executed::done())
    }

    fn var(&mut self, event: &Event) -> EventResult<Executed> {
        let name = self.require_action(event, "var")?;

        if event.actions().get_bool("unset") == Some(true) {
            self.vars.remove(&name);
            self.reporter.log(&format!("Unset var '{}'.", name));
            return Ok(Executed::done());
        }

        let value = self.action(event, "set").unwrap_or_default();
        self.reporter
            .log(&format!("Setting var '{}' to '{}'.", name, value));
        self.vars.put(name, value);
        Ok(Executed::done())
    }

    async fn wait(&mut self, event: &Event) -> EventResult<Executed> {
        let secs = match self.action(event, "timeout") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid("timeout", &raw))?,
            None => DEFAULT_WAIT_SECS,
        };
        let duration = Duration::from_secs(secs);

        self.reporter.log(&format!("Waiting {} seconds.", secs));
        self.watchdog.extend(duration);
        self.guarded(tokio::time::sleep(duration)).await?;
        Ok(Executed::done())
    }

    fn whitelist(&mut self, event: &Event) -> EventResult<Executed> {
        let name = self.require_action(event, "name")?;
        let action = self
            .action(event, "action")
            .unwrap_or_else(|| "add".to_string())
            .to_ascii_lowercase();

        match action.as_str() {
            "add" => {
                let content = self.require_action(event, "content")?;
                self.reporter
                    .log(&format!("Adding whitelist entry '{}'.", name));
                self.whitelist.insert(name, content);
            }
            "delete" => {
                if self.whitelist.remove(&name).is_none() {
                    self.reporter
                        .warning(&format!("Whitelist entry '{}' does not exist.", name));
                }
            }
            other => return Err(invalid("action", other)),
        }
        Ok(Executed::done())
    }
}

/// A header record plus rows, split on commas with `"` quoting. Quoted
/// fields may contain commas, `""` escapes and line breaks.
#[derive(Debug, Default, PartialEq, Eq)]
struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn parse(content: &str) -> Self {
        let mut records = split_csv_records(content).into_iter();
        let headers = records.next().unwrap_or_default();
        Self {
            headers,
            rows: records.collect(),
        }
    }
}

fn split_csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    // Whether the current record had any quoted field; blank unquoted lines are skipped
    let mut saw_quote = false;
    let mut chars = content.chars().peekable();

    let mut finish = |fields: &mut Vec<String>, field: &mut String, saw_quote: bool| {
        fields.push(std::mem::take(field));
        let record: Vec<String> = fields.drain(..).map(|f| f.trim().to_string()).collect();
        let blank = !saw_quote && record.len() == 1 && record[0].is_empty();
        if !blank {
            records.push(record);
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => {
                quoted = !quoted;
                saw_quote = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            '\r' if !quoted && chars.peek() == Some(&'\n') => {}
            '\n' if !quoted => {
                finish(&mut fields, &mut field, saw_quote);
                saw_quote = false;
            }
            c => field.push(c),
        }
    }
    if !field.is_empty() || !fields.is_empty() || saw_quote {
        finish(&mut fields, &mut field, saw_quote);
    }

    records
}
