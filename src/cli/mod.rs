//! CLI module for graphgate
//!
//! Provides command-line interface for:
//! - serve: Load configuration and run the HTTP gateway
//! - check-config: Report missing settings without starting

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_gateway, check_config, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
