//! Browser driver contract
//!
//! The interpreter never talks to a browser directly. Everything it needs
//! from the page (finding elements, clicking, reading text, switching frames
//! and windows) goes through the [`Driver`] trait. Locating elements and
//! retrying until they appear is the driver's job.

mod dry_run;

pub use dry_run::DryRunDriver;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Opaque handle to an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    /// Driver-assigned identifier
    pub id: String,
    /// Lowercase HTML tag name
    pub tag: String,
}

impl Element {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
        }
    }
}

/// How to pick a frame to switch into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTarget {
    Index(u32),
    Name(String),
    Element(Element),
}

/// How to pick an option of a `<select>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionTarget {
    /// Match the visible option text
    Text(String),
    /// Match the option's `value` attribute
    Value(String),
}

/// Errors reported by a driver
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No element found matching {0}")]
    NoSuchElement(String),

    #[error("Element is not visible")]
    ElementNotVisible,

    #[error("No frame found matching {0}")]
    NoSuchFrame(String),

    #[error("No window found matching {0}")]
    NoSuchWindow(String),

    #[error("No alert is present")]
    NoAlert,

    #[error("Browser session lost: {0}")]
    SessionLost(String),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Whether the browser session is gone and nothing else can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::SessionLost(_))
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Operations the interpreter needs from a browser automation backend
#[async_trait]
pub trait Driver: Send + Sync {
    /// Find one element matching every selector, searching under `parent`
    /// when given, retrying for up to `timeout`
    async fn find_element(
        &self,
        selectors: &[(String, String)],
        parent: Option<&Element>,
        timeout: Duration,
    ) -> DriverResult<Element>;

    async fn click(&self, element: &Element) -> DriverResult<()>;

    /// Visible text of the element
    async fn text(&self, element: &Element) -> DriverResult<String>;

    /// Current `value` of a form control
    async fn value(&self, element: &Element) -> DriverResult<String>;

    /// Replace the value of a form control
    async fn set_value(&self, element: &Element, value: &str) -> DriverResult<()>;

    /// Type text after the current value of a form control
    async fn append_value(&self, element: &Element, value: &str) -> DriverResult<()>;

    async fn clear(&self, element: &Element) -> DriverResult<()>;

    async fn is_selected(&self, element: &Element) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &Element) -> DriverResult<bool>;

    async fn select_option(&self, element: &Element, option: &OptionTarget) -> DriverResult<()>;

    /// Dispatch a DOM event (e.g. `onchange`) on the element
    async fn fire_event(&self, element: &Element, event: &str) -> DriverResult<()>;

    async fn switch_to_frame(&self, target: &FrameTarget) -> DriverResult<()>;

    async fn switch_to_default_content(&self) -> DriverResult<()>;

    async fn window_handles(&self) -> DriverResult<Vec<String>>;

    async fn current_window(&self) -> DriverResult<String>;

    async fn switch_to_window(&self, handle: &str) -> DriverResult<()>;

    /// Title of the current window
    async fn title(&self) -> DriverResult<String>;

    /// URL of the current window
    async fn current_url(&self) -> DriverResult<String>;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn back(&self) -> DriverResult<()>;

    async fn forward(&self) -> DriverResult<()>;

    async fn refresh(&self) -> DriverResult<()>;

    /// Close the current window
    async fn close(&self) -> DriverResult<()>;

    async fn page_source(&self) -> DriverResult<String>;

    /// Run JavaScript in the page and return its result rendered as text
    async fn execute_script(&self, script: &str) -> DriverResult<String>;

    /// PNG screenshot of the current window
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Text of the open alert, or [`DriverError::NoAlert`]
    async fn alert_text(&self) -> DriverResult<String>;

    async fn accept_alert(&self) -> DriverResult<()>;

    async fn dismiss_alert(&self) -> DriverResult<()>;

    async fn drag_and_drop(&self, source: &Element, target: &Element) -> DriverResult<()>;
}
