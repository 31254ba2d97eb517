// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Host system information advertised by executors.

use serde::{Deserialize, Serialize};

/// System facts carried in contracts and introspection responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub total_cpu_cores: u32,
    pub total_memory: u64,
}

impl SystemInfo {
    /// Probes the current host.
    pub fn probe() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            total_cpu_cores: cores,
            total_memory: sys.total_memory(),
        }
    }
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
