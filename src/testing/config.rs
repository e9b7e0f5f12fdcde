//! Test script files
//!
//! A test script is a YAML document naming the test and listing its event
//! tree as script nodes:
//!
//! ```yaml
//! name: Login
//! description: Log in as the admin user
//! events:
//!   - tag: browser
//!     attributes: { url: "{@global.site}/login" }
//!   - tag: textfield
//!     attributes: { name: user, set: admin }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::common::{Error, Result};
use crate::event::{Event, EventFactory, ScriptNode};
use crate::interp::ScriptLoader;

/// A complete test script loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScript {
    /// Name of the test
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Top-level events, in order
    #[serde(default)]
    pub events: Vec<ScriptNode>,
}

impl TestScript {
    /// Parse script text; `path` is only used in error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ScriptParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content, path)
    }
}

/// Loads the scripts named by `script` events
#[derive(Debug, Clone)]
pub struct YamlScriptLoader {
    factory: EventFactory,
}

impl YamlScriptLoader {
    pub fn new(factory: EventFactory) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ScriptLoader for YamlScriptLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Event>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_read(path, e))?;
        let script = TestScript::parse(&content, path)?;
        tracing::debug!(script = %script.name, path = %path.display(), "Loaded script");
        self.factory.build_all(&script.events)
    }
}
