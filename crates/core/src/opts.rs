// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Runtime and exec option bundles carried through tenders, contracts,
//! and lifecycle events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of isolated environment a runtime provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeType {
    Host,
    Docker,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Host => write!(f, "host"),
            RuntimeType::Docker => write!(f, "docker"),
        }
    }
}

/// Options describing the runtime a build wants opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOpts {
    #[serde(rename = "type")]
    pub runtime_type: RuntimeType,
    /// Labels an executor must advertise to bid on this runtime.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Free-form key/value metadata, surfaced in events and logs.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerOpts>,
}

impl RuntimeOpts {
    pub fn host() -> Self {
        Self {
            runtime_type: RuntimeType::Host,
            labels: Vec::new(),
            tags: HashMap::new(),
            docker: None,
        }
    }

    pub fn docker(image: DockerPullOpts) -> Self {
        Self {
            runtime_type: RuntimeType::Docker,
            labels: Vec::new(),
            tags: HashMap::new(),
            docker: Some(DockerOpts { image }),
        }
    }
}

/// Docker-specific runtime options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerOpts {
    pub image: DockerPullOpts,
}

/// How (and whether) the executor pulls the runtime image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerPullOpts {
    pub image_uri: String,
    #[serde(default)]
    pub pull_strategy: PullStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<DockerPullAuth>,
}

/// Image pull strategy. The default pulls unless the image exists in the
/// local cache with a non-latest tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStrategy {
    #[default]
    Unspecified,
    Never,
    Always,
    NotExists,
}

impl std::fmt::Display for PullStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullStrategy::Unspecified => write!(f, "default"),
            PullStrategy::Never => write!(f, "never"),
            PullStrategy::Always => write!(f, "always"),
            PullStrategy::NotExists => write!(f, "if-not-exists"),
        }
    }
}

/// Registry credentials for image pulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DockerPullAuth {
    Basic {
        username: String,
        password: String,
    },
    AwsEcr {
        region: String,
        access_key_id: String,
        secret_key: String,
    },
}

/// Options for a single command execution inside a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOpts {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// `KEY=value` pairs, merged over the host environment for host
    /// runtimes and passed verbatim into container execs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl ExecOpts {
    pub fn command(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: Vec::new(),
            tags: HashMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "opts_tests.rs"]
mod tests;
