//! Lifecycle plugins
//!
//! Plugins run at fixed points of a test: before and after the whole test,
//! around element clicks, and after every event. Each registration pairs a
//! [`Matcher`] with a [`Plugin`]; registrations are dispatched in the order
//! they were added.

mod command;
mod registry;

pub use command::CommandPlugin;
pub use registry::{from_config, PluginCatalog, PluginRegistry, Registration};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::common::Result;
use crate::driver::{Driver, Element};
use crate::report::Reporter;
use crate::substitute::HijackMap;
use crate::vars::Vars;

/// Point in a test at which plugins run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginPhase {
    BeforeTest,
    AfterTest,
    BeforeClick,
    AfterClick,
    AfterEvent,
}

impl PluginPhase {
    /// Phases fired once per test, with no current event
    pub fn is_test_scoped(&self) -> bool {
        matches!(self, PluginPhase::BeforeTest | PluginPhase::AfterTest)
    }
}

impl fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginPhase::BeforeTest => "beforetest",
            PluginPhase::AfterTest => "aftertest",
            PluginPhase::BeforeClick => "beforeclick",
            PluginPhase::AfterClick => "afterclick",
            PluginPhase::AfterEvent => "afterevent",
        };
        f.write_str(name)
    }
}

/// Decides whether a registration applies to a fired phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub phase: PluginPhase,
    /// Event tags to match; empty matches every tag
    pub elements: Vec<String>,
}

impl Matcher {
    pub fn new(phase: PluginPhase) -> Self {
        Self {
            phase,
            elements: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.elements = elements.into_iter().map(Into::into).collect();
        self
    }

    /// Test-scoped phases match on phase alone
    pub fn matches(&self, phase: PluginPhase, tag: Option<&str>) -> bool {
        if self.phase != phase {
            return false;
        }
        if phase.is_test_scoped() || self.elements.is_empty() {
            return true;
        }
        match tag {
            Some(tag) => self.elements.iter().any(|e| e.eq_ignore_ascii_case(tag)),
            None => false,
        }
    }
}

/// Read-only view of the run handed to each plugin
pub struct PluginData<'a> {
    /// Element of the current event, if it has one
    pub element: Option<&'a Element>,
    pub driver: &'a dyn Driver,
    pub vars: &'a Vars,
    pub hijacks: &'a HijackMap,
    pub test_name: &'a str,
    /// Positional arguments, set when invoked by a `javaplugin` event
    pub args: &'a [String],
}

/// Code run at a lifecycle phase
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, data: &PluginData<'_>, reporter: &dyn Reporter) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_matching() {
        let matcher = Matcher::new(PluginPhase::AfterClick).with_elements(["button", "link"]);
        assert!(matcher.matches(PluginPhase::AfterClick, Some("BUTTON")));
        assert!(matcher.matches(PluginPhase::AfterClick, Some("link")));
        assert!(!matcher.matches(PluginPhase::AfterClick, Some("div")));
        assert!(!matcher.matches(PluginPhase::BeforeClick, Some("button")));
        assert!(!matcher.matches(PluginPhase::AfterClick, None));
    }

    #[test]
    fn test_empty_elements_match_all() {
        let matcher = Matcher::new(PluginPhase::AfterEvent);
        assert!(matcher.matches(PluginPhase::AfterEvent, Some("puts")));
    }

    #[test]
    fn test_test_scoped_ignore_elements() {
        let matcher = Matcher::new(PluginPhase::BeforeTest).with_elements(["button"]);
        assert!(matcher.matches(PluginPhase::BeforeTest, None));
        assert!(PluginPhase::AfterTest.is_test_scoped());
        assert!(!PluginPhase::AfterEvent.is_test_scoped());
    }

    #[test]
    fn test_phase_names() {
        let phase: PluginPhase = serde_json::from_str("\"beforeclick\"").unwrap();
        assert_eq!(phase, PluginPhase::BeforeClick);
        assert_eq!(phase.to_string(), "beforeclick");
    }
}
