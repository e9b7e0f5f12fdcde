//! The event interpreter
//!
//! [`EventLoop`] walks an event tree depth-first on its own tokio task while
//! a [`Watchdog`] supervisor fails the run if no event makes progress for
//! too long. Per-kind behavior lives in `commands` (control events) and
//! `elements` (events that act on page elements).

mod commands;
mod elements;
mod event_loop;
mod watchdog;

pub use event_loop::{EventLoop, LoopSettings, RunHandle};
pub use watchdog::{supervise, Watchdog};

use async_trait::async_trait;
use std::path::Path;

use crate::common::{Error, Result};
use crate::driver::DriverError;
use crate::event::Event;

/// How a single event ended, when it did not succeed
#[derive(Debug)]
pub enum EventError {
    /// Stop this event and skip its children; anything worth reporting
    /// has already been reported
    Abort,
    /// The target element exists but is not visible
    ElementNotVisible,
    /// The browser is unusable; the whole run fails
    Fatal(Error),
    /// Any other failure, reported with its cause chain
    Infra(Error),
    /// A nested event already reported a fatal error; unwind without
    /// reporting it again
    Halt(Error),
}

pub type EventResult<T> = std::result::Result<T, EventError>;

impl From<DriverError> for EventError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ElementNotVisible => EventError::ElementNotVisible,
            err if err.is_fatal() => EventError::Fatal(Error::Driver(err)),
            err => EventError::Infra(Error::Driver(err)),
        }
    }
}

impl From<Error> for EventError {
    fn from(err: Error) -> Self {
        match err {
            Error::Driver(driver) => driver.into(),
            Error::Cancelled => EventError::Abort,
            err => EventError::Infra(err),
        }
    }
}

/// How a whole run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every event ran
    Completed,
    /// A stop request ended the run early
    Stopped,
    /// The watchdog expired or the browser was lost
    Failed(String),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Loads another script for the `script` event
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Vec<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_classification() {
        assert!(matches!(
            EventError::from(DriverError::ElementNotVisible),
            EventError::ElementNotVisible
        ));
        assert!(matches!(
            EventError::from(DriverError::SessionLost("crashed".into())),
            EventError::Fatal(_)
        ));
        assert!(matches!(
            EventError::from(DriverError::NoAlert),
            EventError::Infra(_)
        ));
    }

    #[test]
    fn test_wrapped_driver_errors_unwrap() {
        let err = Error::Driver(DriverError::ElementNotVisible);
        assert!(matches!(EventError::from(err), EventError::ElementNotVisible));
        assert!(matches!(EventError::from(Error::Cancelled), EventError::Abort));
        assert!(matches!(
            EventError::from(Error::ScopeUnderflow),
            EventError::Infra(Error::ScopeUnderflow)
        ));
    }
}
