//! Configuration types for the SOAP dispatcher.

use std::collections::HashSet;
use std::path::Path;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parser::DEFAULT_MAX_DEPTH;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoapDispatchConfig {
    /// Config version
    pub version: String,

    /// Request pipeline settings
    pub settings: SettingsConfig,

    /// Listener settings for the standalone binary
    pub server: ServerConfig,

    /// Canned responses served per action by the standalone binary
    pub actions: Vec<StaticActionConfig>,
}

impl Default for SoapDispatchConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: SettingsConfig::default(),
            server: ServerConfig::default(),
            actions: Vec::new(),
        }
    }
}

impl SoapDispatchConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.max_body_size == 0 {
            return Err(ConfigError::Invalid("settings.max_body_size must be > 0".into()));
        }
        if self.settings.max_depth == 0 {
            return Err(ConfigError::Invalid("settings.max_depth must be > 0".into()));
        }
        if self.server.listen.trim().is_empty() {
            return Err(ConfigError::Invalid("server.listen must not be empty".into()));
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.path must start with '/': {}",
                self.server.path
            )));
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.action.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate action: {}",
                    action.action
                )));
            }
            action.status_code()?;
        }
        Ok(())
    }
}

/// Request pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Maximum body size to read (bytes)
    pub max_body_size: usize,

    /// Maximum XML nesting depth
    pub max_depth: u32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1_048_576, // 1MB
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub listen: String,

    /// Path the dispatcher is mounted at
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            path: "/".to_string(),
        }
    }
}

/// Fixed response for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticActionConfig {
    /// Action key, matched exactly (include quotes if clients send them)
    pub action: String,

    /// Response status
    pub status: u16,

    /// Response Content-Type
    pub content_type: String,

    /// Response body
    pub body: String,
}

impl Default for StaticActionConfig {
    fn default() -> Self {
        Self {
            action: String::new(),
            status: 200,
            content_type: "text/xml; charset=utf-8".to_string(),
            body: String::new(),
        }
    }
}

impl StaticActionConfig {
    /// Response status as a typed code.
    pub fn status_code(&self) -> Result<StatusCode, ConfigError> {
        StatusCode::from_u16(self.status).map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid status {} for action {}",
                self.status, self.action
            ))
        })
    }
}
