//! Events that act on a page element

use super::event_loop::{invalid, missing, EventLoop, Executed, Restore};
use super::{EventError, EventResult};
use crate::driver::{DriverError, Element, FrameTarget, OptionTarget};
use crate::event::{AttrValue, Event, EventKind};
use crate::plugin::PluginPhase;

impl EventLoop {
    /// Locate the element, then apply its actions in a fixed order:
    /// exists, store, disabled, clear, set, setreal, append, assert,
    /// assertnot, var, jscriptevent, click, alert
    pub(super) async fn execute_element(
        &mut self,
        event: &Event,
        parent: Option<&Element>,
    ) -> EventResult<Executed> {
        let Some(element) = self.locate(event, parent).await? else {
            return Err(EventError::Abort);
        };
        let kind = event.kind();
        let actions = event.actions();

        if let Some(name) = self.action(event, "store") {
            tracing::debug!(name = %name, element = %element.id, "Storing element");
            self.stored.insert(name, element.clone());
        }

        if let Some(expected) = actions.get_bool("disabled") {
            let enabled = self.call(self.driver.is_enabled(&element)).await?;
            if enabled == expected {
                self.reporter.error(&format!(
                    "{} element is {}, expected disabled = {}.",
                    event.name(),
                    if enabled { "enabled" } else { "disabled" },
                    expected
                ));
            }
        }

        if actions.get_bool("clear") == Some(true) {
            self.reporter.log(&format!("Clearing {} element.", event.name()));
            self.call(self.driver.clear(&element)).await?;
        }

        match actions.get("set") {
            Some(AttrValue::Bool(desired)) => self.set_toggle(event, &element, *desired).await?,
            Some(AttrValue::Str(raw)) => {
                let value = self.sub(raw);
                if kind == EventKind::Select {
                    self.reporter
                        .log(&format!("Selecting option with text '{}'.", value));
                    self.call(
                        self.driver
                            .select_option(&element, &OptionTarget::Text(value)),
                    )
                    .await?;
                } else {
                    self.reporter.log(&format!("Setting value to '{}'.", value));
                    self.call(self.driver.set_value(&element, &value)).await?;
                }
            }
            None => {}
        }

        if let Some(value) = self.action(event, "setreal") {
            self.reporter
                .log(&format!("Selecting option with value '{}'.", value));
            self.call(
                self.driver
                    .select_option(&element, &OptionTarget::Value(value)),
            )
            .await?;
        }

        if let Some(value) = self.action(event, "append") {
            self.reporter.log(&format!("Appending '{}'.", value));
            self.call(self.driver.append_value(&element, &value)).await?;
        }

        let assert = self.action(event, "assert");
        let assert_not = self.action(event, "assertnot");
        if assert.is_some() || assert_not.is_some() {
            let text = self.element_value(kind, &element).await?;
            if let Some(expected) = assert {
                self.reporter.assert(&expected, &text);
            }
            if let Some(unexpected) = assert_not {
                self.reporter.assert_not(&unexpected, &text);
            }
        }

        if let Some(name) = self.action(event, "var") {
            let value = self.element_value(kind, &element).await?;
            self.reporter
                .log(&format!("Storing element value in var '{}'.", name));
            self.vars.put(name, value);
        }

        if let Some(js_event) = self.action(event, "jscriptevent") {
            self.reporter
                .log(&format!("Firing javascript event '{}'.", js_event));
            self.call(self.driver.fire_event(&element, &js_event)).await?;
        }

        if actions.get_bool("click") == Some(true) {
            self.click(event, &element).await?;
        }

        if let Some(accept) = actions.get_bool("alert") {
            self.answer_alert(accept).await?;
        }

        Ok(Executed::with_element(element))
    }

    /// Find the event's element, reporting a miss. `Ok(None)` means the
    /// event should stop.
    async fn locate(
        &self,
        event: &Event,
        parent: Option<&Element>,
    ) -> EventResult<Option<Element>> {
        let selectors: Vec<(String, String)> = event
            .selectors()
            .iter()
            .map(|(name, value)| (name.to_string(), self.sub(&value.to_string())))
            .collect();
        let expect_exists = event.actions().get_bool("exists");

        let found = self
            .guarded(self.driver.find_element(
                &selectors,
                parent,
                self.settings.element_timeout,
            ))
            .await?;

        match found {
            Ok(element) => {
                if expect_exists == Some(false) {
                    self.reporter.error(&format!(
                        "Found {} element, but exists = false.",
                        event.name()
                    ));
                    return Ok(None);
                }
                Ok(Some(element))
            }
            Err(DriverError::NoSuchElement(description)) => {
                match expect_exists {
                    Some(false) => self.reporter.log(&format!(
                        "{} element does not exist, as expected.",
                        event.name()
                    )),
                    None if !event.required() => self.reporter.log(&format!(
                        "Failed to find {} element {}, but required = false.",
                        event.name(),
                        description
                    )),
                    _ => self.reporter.error(&format!(
                        "Failed to find {} element {}.",
                        event.name(),
                        description
                    )),
                }
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Click only when the selected state differs from `desired`
    async fn set_toggle(&self, event: &Event, element: &Element, desired: bool) -> EventResult<()> {
        if event.kind() == EventKind::Radio && !desired {
            self.reporter.error("Impossible to deselect radio elements.");
            return Ok(());
        }

        let actual = self.call(self.driver.is_selected(element)).await?;
        let state = |selected: bool| if selected { "selected" } else { "deselected" };
        if desired != actual {
            self.reporter.log(&format!(
                "Setting {} state to {}.",
                event.name(),
                state(desired)
            ));
            self.click(event, element).await
        } else {
            self.reporter.log(&format!(
                "{} is already {}. Skipping.",
                event.name(),
                state(actual)
            ));
            Ok(())
        }
    }

    async fn click(&self, event: &Event, element: &Element) -> EventResult<()> {
        self.fire(PluginPhase::BeforeClick, Some(event), Some(element))
            .await;
        self.reporter
            .log(&format!("Clicking {} element.", event.name()));
        self.call(self.driver.click(element)).await?;
        self.fire(PluginPhase::AfterClick, Some(event), Some(element))
            .await;
        Ok(())
    }

    async fn answer_alert(&self, accept: bool) -> EventResult<()> {
        let answered = if accept {
            self.guarded(self.driver.accept_alert()).await?
        } else {
            self.guarded(self.driver.dismiss_alert()).await?
        };
        match answered {
            Ok(()) => {
                self.reporter.log(if accept {
                    "Accepted alert dialog."
                } else {
                    "Dismissed alert dialog."
                });
                Ok(())
            }
            Err(DriverError::NoAlert) => {
                self.reporter.error("Expected an alert dialog, but none appeared.");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Value used by asserts and `var`: form controls report their value,
    /// everything else its visible text
    async fn element_value(&self, kind: EventKind, element: &Element) -> EventResult<String> {
        if kind.is_text_input() || matches!(kind, EventKind::Select | EventKind::Filefield) {
            self.call(self.driver.value(element)).await
        } else {
            self.call(self.driver.text(element)).await
        }
    }

    /// Switch into a frame; its children run inside it and the default
    /// content is restored afterwards
    pub(super) async fn execute_frame(
        &mut self,
        event: &Event,
        parent: Option<&Element>,
    ) -> EventResult<Executed> {
        let selectors = event.selectors();

        let target = if let Some(raw) = selectors.get_str("index") {
            let index = self.sub(raw);
            FrameTarget::Index(
                index
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| invalid("index", &index))?,
            )
        } else if let Some(raw) = selectors.get_str("id").or_else(|| selectors.get_str("name")) {
            FrameTarget::Name(self.sub(raw))
        } else if selectors.contains("xpath") || selectors.contains("css") {
            match self.locate(event, parent).await? {
                Some(element) => FrameTarget::Element(element),
                None => return Err(EventError::Abort),
            }
        } else {
            return Err(missing(event, "one of 'index', 'id', 'name', 'xpath' or 'css' is required"));
        };

        self.reporter
            .log(&format!("Switching to frame {:?}.", target));
        match self.guarded(self.driver.switch_to_frame(&target)).await? {
            Ok(()) => Ok(Executed {
                element: None,
                restore: Restore::DefaultContent,
            }),
            Err(DriverError::NoSuchFrame(description)) => {
                self.reporter
                    .error(&format!("No frame found matching {}.", description));
                Err(EventError::Abort)
            }
            Err(err) => Err(err.into()),
        }
    }
}
