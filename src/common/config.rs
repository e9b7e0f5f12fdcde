//! Configuration file handling

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};
use crate::plugin::PluginPhase;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Values that override same-named script variables
    #[serde(default)]
    pub hijacks: BTreeMap<String, String>,

    /// Global variables, visible to scripts as `global.<name>`
    #[serde(default)]
    pub globals: BTreeMap<String, String>,

    /// External command plugins
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Strings that must never appear on a page checked with `assertpage`
    #[serde(default)]
    pub page_checks: Vec<String>,
}

/// Timeout settings
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Seconds without progress before the watchdog fails a run
    #[serde(default = "default_watchdog")]
    pub watchdog_secs: u64,

    /// How often the watchdog checks for progress
    #[serde(default = "default_watchdog_poll")]
    pub watchdog_poll_ms: u64,

    /// How long the driver retries element lookups
    #[serde(default = "default_element")]
    pub element_secs: u64,

    /// How long `attach` retries finding a window
    #[serde(default)]
    pub attach_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            watchdog_secs: default_watchdog(),
            watchdog_poll_ms: default_watchdog_poll(),
            element_secs: default_element(),
            attach_secs: 0,
        }
    }
}

fn default_watchdog() -> u64 {
    300
}
fn default_watchdog_poll() -> u64 {
    1000
}
fn default_element() -> u64 {
    5
}

impl Timeouts {
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    pub fn watchdog_poll(&self) -> Duration {
        Duration::from_millis(self.watchdog_poll_ms.max(1))
    }

    pub fn element(&self) -> Duration {
        Duration::from_secs(self.element_secs)
    }

    pub fn attach(&self) -> Duration {
        Duration::from_secs(self.attach_secs)
    }
}

/// An external command run as a plugin
#[derive(Debug, Deserialize, Clone)]
pub struct PluginConfig {
    /// Name used in logs and by `javaplugin`/`pluginloader` events
    pub name: String,

    /// Lifecycle phase the plugin runs at
    pub phase: PluginPhase,

    /// Event tags the plugin applies to; empty means every tag
    #[serde(default)]
    pub elements: Vec<String>,

    /// Program to run
    pub command: PathBuf,

    /// Arguments, substituted before each run
    #[serde(default)]
    pub args: Vec<String>,

    /// Only make the plugin available to scripts instead of registering it
    #[serde(default)]
    pub catalog: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Add `key=value` hijacks given on the command line
    pub fn apply_hijack_args(&mut self, args: &[String]) -> Result<()> {
        for arg in args {
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("Hijack '{}' must have the form key=value", arg))
            })?;
            self.hijacks.insert(key.trim().to_string(), value.to_string());
        }
        Ok(())
    }
}
