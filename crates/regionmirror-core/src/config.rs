// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Settings for the replication function.
//!
//! The replication topology itself always comes from the environment (see
//! [`crate::topology`]). These settings only tune how the function logs,
//! which storage endpoints it talks to and how it fans out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable naming an optional TOML settings file.
pub const CONFIG_ENV_VAR: &str = "REGIONMIRROR_CONFIG";

/// Default S3-compatible endpoint template.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str =
    "https://{namespace}.compat.objectstorage.{region}.oraclecloud.com";

/// Settings for one function deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Storage gateway configuration.
    pub gateway: GatewayConfig,
    /// Dispatch configuration.
    pub dispatch: DispatchConfig,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Settings(e.to_string()))
    }

    /// Load settings from `path`, falling back to the file named by
    /// [`CONFIG_ENV_VAR`], falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// Storage gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint URL template. `{region}` and `{namespace}` are substituted per call.
    pub endpoint_template: String,
    /// Use path-style bucket addressing.
    pub force_path_style: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(), force_path_style: true }
    }
}

impl GatewayConfig {
    /// Render the endpoint URL for a region and namespace.
    pub fn endpoint(&self, region: &str, namespace: &str) -> String {
        self.endpoint_template.replace("{region}", region).replace("{namespace}", namespace)
    }
}

/// How destinations are driven during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One destination at a time, in topology order.
    #[default]
    Sequential,
    /// One task per destination, joined before the result is built.
    Concurrent,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Fan-out mode.
    pub mode: DispatchMode,
}

impl DispatchConfig {
    /// Creates a dispatch configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fan-out mode.
    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }
}
