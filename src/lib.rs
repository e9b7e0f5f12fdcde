//! Voodoo - an event interpreter for browser acceptance tests
//!
//! Test scripts are trees of typed events. The [`event`] module validates
//! script nodes against the schema registry, [`interp`] runs the resulting
//! events against a [`driver::Driver`] under a watchdog, and [`plugin`]
//! hooks external commands into the run's lifecycle.

pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod event;
pub mod interp;
pub mod plugin;
pub mod report;
pub mod substitute;
pub mod testing;
pub mod vars;

// Re-export commonly used types for tests
pub use common::{Error, Result};
