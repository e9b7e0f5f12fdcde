//! Voodoo test driver - runs browser acceptance test scripts
//!
//! Scripts are YAML event trees interpreted against a browser driver.

use clap::Parser;
use voodoo::common::logging;
use voodoo::{cli, commands};
use commands::Commands;

#[derive(Parser)]
#[command(name = "vdd", about = "Browser acceptance test driver")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered log lines are flushed
    let log_guard = if cli.command.log_file() {
        logging::init_with_file("vdd", cli.command.verbose()).map(|(path, guard)| {
            tracing::info!(path = %path.display(), "Logging to file");
            guard
        })
    } else {
        logging::init_cli(cli.command.verbose());
        None
    };

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        drop(log_guard);
        std::process::exit(1);
    }
}
