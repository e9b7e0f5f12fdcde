//! Test script loading and the test runner
//!
//! Scripts are YAML files holding a script node tree. The runner builds the
//! events, runs them on an event loop and prints a colored summary.

mod config;
mod runner;

pub use config::{TestScript, YamlScriptLoader};
pub use runner::{load_script, run_script, TestResult};
