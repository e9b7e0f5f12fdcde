//! Error types for the event interpreter
//!
//! Load-time errors (unknown tags, bad attributes) are fatal to a test file.
//! Execution-time errors are classified per event by the interpreter, see
//! [`crate::interp::EventError`].

use std::io;
use thiserror::Error;

use crate::driver::DriverError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the interpreter
#[derive(Error, Debug)]
pub enum Error {
    // === Script Loading Errors ===
    #[error("Unknown event '{0}'")]
    UnknownEventKind(String),

    #[error("Invalid attribute '{attribute}' for '{kind}' event")]
    InvalidAttribute { attribute: String, kind: String },

    #[error("Failed to parse script '{path}': {message}")]
    ScriptParse { path: String, message: String },

    // === Variable Errors ===
    #[error("Cannot pop the base variable scope")]
    ScopeUnderflow,

    // === Execution Errors ===
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Plugin '{name}' failed: {message}")]
    Plugin { name: String, message: String },

    #[error("Command '{command}' failed: {message}")]
    Process { command: String, message: String },

    #[error("Missing attribute for '{kind}' event: {message}")]
    MissingAttribute { kind: String, message: String },

    #[error("Invalid value '{value}' for attribute '{attribute}'")]
    InvalidValue { attribute: String, value: String },

    #[error("Run cancelled")]
    Cancelled,

    // === Timeout Errors ===
    #[error("Watchdog expired: no activity for {0} seconds")]
    WatchdogExpired(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("{failed} of {total} test scripts failed")]
    TestsFailed { failed: usize, total: usize },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid attribute error
    pub fn invalid_attribute(attribute: &str, kind: &str) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Create a missing attribute error
    pub fn missing_attribute(kind: &str, message: &str) -> Self {
        Self::MissingAttribute {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(attribute: &str, value: &str) -> Self {
        Self::InvalidValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a plugin failure error
    pub fn plugin(name: &str, message: impl Into<String>) -> Self {
        Self::Plugin {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error happened while loading a script rather than running it
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownEventKind(_) | Error::InvalidAttribute { .. } | Error::ScriptParse { .. }
        )
    }
}
