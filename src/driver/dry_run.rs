//! A driver that performs no browser work and logs every call
//!
//! Useful for checking a script's control flow and variable substitution
//! without a browser. Every lookup succeeds with a synthetic element; pages
//! are empty and no alert is ever open.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{Driver, DriverError, DriverResult, Element, FrameTarget, OptionTarget};

const MAIN_WINDOW: &str = "main";

#[derive(Debug, Default)]
struct DryRunState {
    next_id: u64,
    url: String,
    closed: bool,
}

/// Driver that logs instead of acting
#[derive(Debug, Default)]
pub struct DryRunDriver {
    state: Mutex<DryRunState>,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut DryRunState) -> T) -> DriverResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DriverError::Other("dry-run state poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

#[async_trait]
impl Driver for DryRunDriver {
    async fn find_element(
        &self,
        selectors: &[(String, String)],
        parent: Option<&Element>,
        _timeout: Duration,
    ) -> DriverResult<Element> {
        let tag = selectors
            .iter()
            .find(|(name, _)| name == "html_tag")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        let id = self.with_state(|s| {
            s.next_id += 1;
            format!("dry-{}", s.next_id)
        })?;
        tracing::info!(
            target: "voodoo::dry_run",
            element = %id,
            ?selectors,
            parent = parent.map(|p| p.id.as_str()),
            "find element"
        );
        Ok(Element::new(id, tag))
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, "click");
        Ok(())
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, "read text");
        Ok(String::new())
    }

    async fn value(&self, element: &Element) -> DriverResult<String> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, "read value");
        Ok(String::new())
    }

    async fn set_value(&self, element: &Element, value: &str) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, value, "set value");
        Ok(())
    }

    async fn append_value(&self, element: &Element, value: &str) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, value, "append value");
        Ok(())
    }

    async fn clear(&self, element: &Element) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, "clear");
        Ok(())
    }

    async fn is_selected(&self, _element: &Element) -> DriverResult<bool> {
        Ok(false)
    }

    async fn is_enabled(&self, _element: &Element) -> DriverResult<bool> {
        Ok(true)
    }

    async fn select_option(&self, element: &Element, option: &OptionTarget) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, ?option, "select option");
        Ok(())
    }

    async fn fire_event(&self, element: &Element, event: &str) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", element = %element.id, event, "fire event");
        Ok(())
    }

    async fn switch_to_frame(&self, target: &FrameTarget) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", ?target, "switch to frame");
        Ok(())
    }

    async fn switch_to_default_content(&self) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", "switch to default content");
        Ok(())
    }

    async fn window_handles(&self) -> DriverResult<Vec<String>> {
        let closed = self.with_state(|s| s.closed)?;
        if closed {
            Ok(Vec::new())
        } else {
            Ok(vec![MAIN_WINDOW.to_string()])
        }
    }

    async fn current_window(&self) -> DriverResult<String> {
        Ok(MAIN_WINDOW.to_string())
    }

    async fn switch_to_window(&self, handle: &str) -> DriverResult<()> {
        if handle == MAIN_WINDOW {
            Ok(())
        } else {
            Err(DriverError::NoSuchWindow(handle.to_string()))
        }
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.with_state(|s| s.url.clone())
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", url, "navigate");
        self.with_state(|s| s.url = url.to_string())
    }

    async fn back(&self) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", "back");
        Ok(())
    }

    async fn forward(&self) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", "forward");
        Ok(())
    }

    async fn refresh(&self) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", "refresh");
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        tracing::info!(target: "voodoo::dry_run", "close window");
        self.with_state(|s| s.closed = true)
    }

    async fn page_source(&self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn execute_script(&self, script: &str) -> DriverResult<String> {
        tracing::info!(target: "voodoo::dry_run", len = script.len(), "execute script");
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
        tracing::info!(
            target: "voodoo::dry_run",
            source = %source.id,
            destination = %target.id,
            "drag and drop"
        );
        Ok(())
    }
}
