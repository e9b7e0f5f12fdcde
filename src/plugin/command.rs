//! Plugins that run an external program

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{Plugin, PluginData};
use crate::common::config::PluginConfig;
use crate::common::{Error, Result};
use crate::report::Reporter;
use crate::substitute::substitute;

/// Runs a program with substituted arguments; a non-zero exit is a failure.
///
/// The current test name and element id are passed in the environment as
/// `VDD_TEST_NAME` and `VDD_ELEMENT_ID`.
#[derive(Debug, Clone)]
pub struct CommandPlugin {
    name: String,
    command: PathBuf,
    args: Vec<String>,
}

impl CommandPlugin {
    pub fn new(name: impl Into<String>, command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(&config.name, &config.command, config.args.clone())
    }
}

#[async_trait]
impl Plugin for CommandPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, data: &PluginData<'_>, reporter: &dyn Reporter) -> Result<()> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| substitute(arg, data.hijacks, data.vars))
            .chain(data.args.iter().cloned())
            .collect();

        tracing::debug!(
            plugin = %self.name,
            command = %self.command.display(),
            ?args,
            "Running plugin command"
        );

        let mut command = Command::new(&self.command);
        command
            .args(&args)
            .env("VDD_TEST_NAME", data.test_name)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(element) = data.element {
            command.env("VDD_ELEMENT_ID", &element.id);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Error::plugin(&self.name, format!("failed to start: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            reporter.log(&format!("{}: {}", self.name, line));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::plugin(
                &self.name,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(())
    }
}
