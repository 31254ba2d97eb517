// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! CLI configuration (`$HOME/.knita.yaml`).

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub executors: ExecutorsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorsConfig {
    #[serde(default)]
    pub local: LocalExecutorConfig,
    #[serde(default)]
    pub remote: Vec<RemoteExecutorConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalExecutorConfig {
    /// Disables the embedded executor. If true, a remote executor must
    /// be configured.
    #[serde(default)]
    pub disabled: bool,
    /// Labels the embedded executor advertises.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteExecutorConfig {
    #[serde(default)]
    pub disabled: bool,
    /// TCP "host:port".
    #[serde(default)]
    pub address: String,
}

/// Default config file path: `$HOME/.knita.yaml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".knita.yaml"))
}

impl CliConfig {
    /// Loads `path` (or the default path) if it exists; otherwise the
    /// defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_path(),
        };
        match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                let config = serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?;
                tracing::info!(path = %path.display(), "using config file");
                Ok(config)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
