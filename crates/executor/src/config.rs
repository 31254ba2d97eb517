// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Standalone executor configuration.

use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:9091";

/// YAML config for the `knita-executor` binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorConfig {
    /// TCP address the executor listens on.
    #[serde(default)]
    pub bind_address: String,
    /// Human-friendly name; should be unique across executors.
    #[serde(default)]
    pub name: String,
    /// Labels the executor advertises to the broker.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ExecutorConfig {
    /// Loads the config file if present, then fills defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?
            }
            _ => Self::default(),
        };
        config.fill_defaults();
        Ok(config)
    }

    fn fill_defaults(&mut self) {
        if self.bind_address.is_empty() {
            self.bind_address = DEFAULT_BIND_ADDRESS.to_string();
        }
        if self.name.is_empty() {
            self.name = sysinfo::System::host_name()
                .unwrap_or_else(|| format!("{} (name unconfigured)", uuid::Uuid::new_v4()));
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(String, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(String, serde_yaml::Error),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
