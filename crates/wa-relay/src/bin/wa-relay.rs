//! CLI entrypoint for the chat relay.

#[path = "wa-relay/cli.rs"]
mod cli;
#[path = "wa-relay/run.rs"]
mod run;

use clap::Parser;

use cli::{Cli, Command};

fn main() {
    if let Err(err) = dispatch() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn dispatch() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        None => run::run_relay(None, cli.verbose),
        Some(Command::Run { config }) => run::run_relay(config, cli.verbose),
        Some(Command::Reset { config }) => run::run_reset(config, cli.verbose),
        Some(Command::Validate { config }) => run::run_validate(config),
    }
}
