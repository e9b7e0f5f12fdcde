//! CLI command definitions
//!
//! Defines the clap commands for the test driver CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more test scripts
    Run {
        /// Paths to YAML test scripts, run in order
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Configuration file (default: the user config directory)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override a script variable: --hijack name=value
        /// Can be specified multiple times
        #[arg(long = "hijack", short = 'H')]
        hijacks: Vec<String>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Also write logs to a file in the log directory
        #[arg(long)]
        log_file: bool,
    },

    /// Parse and validate test scripts without running them
    Check {
        /// Paths to YAML test scripts
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },

    /// List event kinds and the attributes they accept
    Kinds {
        /// Only show this tag
        tag: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Whether the command asked for verbose output
    pub fn verbose(&self) -> bool {
        matches!(self, Commands::Run { verbose: true, .. })
    }

    /// Whether the command asked for a log file
    pub fn log_file(&self) -> bool {
        matches!(self, Commands::Run { log_file: true, .. })
    }
}
