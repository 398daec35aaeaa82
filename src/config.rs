//! Gateway configuration
//!
//! Loaded once at startup: an optional JSON file first, then environment
//! variables on top of it.
//!
//! | Variable          | Setting                  |
//! |-------------------|--------------------------|
//! | `NEO4J_URI`       | `database.uri`           |
//! | `NEO4J_USERNAME`  | `database.username`      |
//! | `NEO4J_PASSWORD`  | `database.password`      |
//! | `NEO4J_DATABASE`  | `database.database`      |
//! | `API_KEY`         | `api_key`                |
//! | `HOST`            | `server.host`            |
//! | `PORT`            | `server.port`            |
//!
//! Missing required settings are reported by [`GatewayConfig::diagnostics`]
//! but never make loading fail.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::HttpServerConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
}

/// Database connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Database name on the server (default: "neo4j")
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "neo4j".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            database: default_database(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// Bounds applied to every proxied request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Most statements accepted in one batch (default: 1000)
    #[serde(default = "default_max_batch_statements")]
    pub max_batch_statements: usize,

    /// Per-statement timeout; none means the driver's own behavior
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
}

fn default_max_batch_statements() -> usize {
    1000
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_batch_statements: default_max_batch_statements(),
            statement_timeout_ms: None,
        }
    }
}

/// Full gateway configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Shared secret expected in the `x-api-key` header
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub limits: ExecutionLimits,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("limits", &self.limits)
            .finish()
    }
}

/// Whether one required setting was loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingStatus {
    pub name: &'static str,
    pub loaded: bool,
}

impl GatewayConfig {
    /// Load from an optional JSON file, then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override settings from an environment lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(uri) = get("NEO4J_URI") {
            self.database.uri = Some(uri);
        }
        if let Some(username) = get("NEO4J_USERNAME") {
            self.database.username = Some(username);
        }
        if let Some(password) = get("NEO4J_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(database) = get("NEO4J_DATABASE") {
            self.database.database = database;
        }
        if let Some(api_key) = get("API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port.parse::<u16>().map_err(|e| ConfigError::InvalidEnv {
                name: "PORT",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Report which of the four required settings are present
    pub fn diagnostics(&self) -> Vec<SettingStatus> {
        let loaded = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        vec![
            SettingStatus {
                name: "NEO4J_URI",
                loaded: loaded(&self.database.uri),
            },
            SettingStatus {
                name: "NEO4J_USERNAME",
                loaded: loaded(&self.database.username),
            },
            SettingStatus {
                name: "NEO4J_PASSWORD",
                loaded: loaded(&self.database.password),
            },
            SettingStatus {
                name: "API_KEY",
                loaded: loaded(&self.api_key),
            },
        ]
    }

    /// True when every required setting is present
    pub fn is_complete(&self) -> bool {
        self.diagnostics().iter().all(|s| s.loaded)
    }
}
