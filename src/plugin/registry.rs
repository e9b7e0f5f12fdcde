//! Plugin registrations and the named catalog

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{CommandPlugin, Matcher, Plugin, PluginPhase};
use crate::common::config::PluginConfig;

/// A plugin paired with the matcher deciding when it runs
#[derive(Clone)]
pub struct Registration {
    pub matcher: Matcher,
    pub plugin: Arc<dyn Plugin>,
}

impl Registration {
    pub fn new(matcher: Matcher, plugin: Arc<dyn Plugin>) -> Self {
        Self { matcher, plugin }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("matcher", &self.matcher)
            .field("plugin", &self.plugin.name())
            .finish()
    }
}

/// Ordered list of active registrations
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    registrations: Vec<Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration after every existing one
    pub fn register(&mut self, registration: Registration) {
        tracing::debug!(
            plugin = registration.plugin.name(),
            phase = %registration.matcher.phase,
            "Registered plugin"
        );
        self.registrations.push(registration);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Plugins matching a phase and event tag, in registration order
    pub fn matching<'a>(
        &'a self,
        phase: PluginPhase,
        tag: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Arc<dyn Plugin>> + 'a {
        self.registrations
            .iter()
            .filter(move |r| r.matcher.matches(phase, tag))
            .map(|r| &r.plugin)
    }
}

/// Plugins that scripts can invoke or load by name
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    entries: HashMap<String, Registration>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, registration: Registration) {
        self.entries
            .insert(registration.plugin.name().to_string(), registration);
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the active registry and the catalog from configured plugins.
///
/// Every configured plugin is available by name in the catalog; those not
/// marked `catalog` are also registered up front, in file order.
pub fn from_config(configs: &[PluginConfig]) -> (PluginRegistry, PluginCatalog) {
    let mut registry = PluginRegistry::new();
    let mut catalog = PluginCatalog::new();

    for config in configs {
        let registration = Registration::new(
            Matcher::new(config.phase).with_elements(config.elements.iter().cloned()),
            Arc::new(CommandPlugin::from_config(config)),
        );
        if !config.catalog {
            registry.register(registration.clone());
        }
        catalog.insert(registration);
    }

    (registry, catalog)
}
