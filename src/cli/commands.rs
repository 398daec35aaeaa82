//! CLI command implementations
//!
//! `serve` never refuses to start over missing settings: they are logged,
//! and a gateway without a driver answers every proxied call with 500.
//! `check-config` is the strict variant for deploy pipelines.

use std::path::Path;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::driver::HttpGraphDriver;
use crate::gateway::{Dispatcher, Gateway};
use crate::http_server::HttpServer;
use crate::observability::Logger;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::CheckConfig { config } => check_config(config.as_deref()),
    }
}

/// Load configuration, build the gateway and serve until killed
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let mut config = GatewayConfig::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    log_diagnostics(&config);

    let gateway = build_gateway(&config);
    let server = HttpServer::new(config.server.clone(), gateway);

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        boot_failure("RUNTIME_FAILED", format!("Failed to create tokio runtime: {}", e))
    })?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| boot_failure("HTTP_SERVER_FAILED", format!("HTTP server failed: {}", e)))
    })
}

/// Log a fatal boot error and turn it into the CLI error
fn boot_failure(event: &str, message: String) -> CliError {
    Logger::fatal(event, &[("reason", &message)]);
    CliError::boot_failed(message)
}

/// Print the settings report as JSON; fail if anything required is missing
pub fn check_config(config_path: Option<&Path>) -> CliResult<()> {
    let config = GatewayConfig::load(config_path)?;
    let diagnostics = config.diagnostics();

    let report = serde_json::json!({ "settings": diagnostics });
    println!("{}", report);

    let missing: Vec<&str> = diagnostics
        .iter()
        .filter(|s| !s.loaded)
        .map(|s| s.name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::config_incomplete(&missing))
    }
}

/// Create the process-wide driver and wrap it in a gateway.
///
/// A driver that cannot be created is logged and left out; requests then
/// fail with an infrastructure error instead of the process exiting.
pub fn build_gateway(config: &GatewayConfig) -> Gateway {
    let dispatcher = match HttpGraphDriver::new(&config.database) {
        Ok(driver) => {
            let endpoint = driver.commit_url().to_string();
            Logger::info("DRIVER_CREATED", &[("endpoint", &endpoint)]);
            Dispatcher::new(Arc::new(driver), config.limits.clone())
        }
        Err(e) => {
            let reason = e.to_string();
            Logger::error("DRIVER_UNAVAILABLE", &[("reason", &reason)]);
            Dispatcher::without_driver(config.limits.clone())
        }
    };

    Gateway::new(config.api_key.clone(), dispatcher)
}

fn log_diagnostics(config: &GatewayConfig) {
    for setting in config.diagnostics() {
        if setting.loaded {
            Logger::info("CONFIG_SETTING", &[("name", setting.name), ("loaded", "true")]);
        } else {
            Logger::warn("CONFIG_SETTING", &[("name", setting.name), ("loaded", "false")]);
        }
    }
}
