//! CLI definitions for wa-relay.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "wa-relay",
    version,
    about = "Chat relay with a device-linking status page",
    infer_subcommands = true,
    after_help = "Examples:\n  wa-relay                          # run with ./relay.toml (or defaults)\n  wa-relay run --config /etc/wa-relay/relay.toml\n  wa-relay reset                    # forget the linked device\n  wa-relay validate --config relay.toml"
)]
pub struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the relay and its status page (default).
    Run {
        /// Config file (defaults to ./relay.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Delete stored credentials so the next start shows a new pairing code.
    Reset {
        /// Config file (defaults to ./relay.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check a config file and print the effective settings.
    Validate {
        /// Config file (defaults to ./relay.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
