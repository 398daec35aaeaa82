//! CLI argument definitions using clap
//!
//! Commands:
//! - graphgate serve [--config <path>] [--port <port>]
//! - graphgate check-config [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// graphgate - authenticated HTTP gateway for Cypher statements
#[derive(Parser, Debug)]
#[command(name = "graphgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP gateway
    Serve {
        /// Optional JSON configuration file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Report which required settings are loaded and exit
    CheckConfig {
        /// Optional JSON configuration file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
