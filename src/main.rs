//! Unified smartroute CLI.
//!
//! - `smartroute check` - Validate settings and show compiled rule counts
//! - `smartroute decide <url>` - Decide one request
//! - `smartroute pac` - Emit the decision script
//! - `smartroute compile <pattern>` - Classify one pattern

use std::process::ExitCode;

use clap::Parser;
use smartroute::cli::{self, Command, GlobalArgs};

/// smartroute unified CLI.
#[derive(Parser)]
#[command(
    name = "smartroute",
    version,
    about = "Per-origin proxy routing rules, decisions and PAC scripts",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli::run(cli.global, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
