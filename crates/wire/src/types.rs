// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Shared broker/executor record types.

use knita_core::{RuntimeOpts, SystemInfo};
use serde::{Deserialize, Serialize};

/// A bid from an executor willing to host a tendered runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub tender_id: String,
    pub contract_id: String,
    /// Runtime id pre-assigned by the broker; the director opens the
    /// runtime under this id on the settled executor.
    pub runtime_id: String,
    pub opts: RuntimeOpts,
    pub executor_info: ExecutorInfo,
    pub sys_info: SystemInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub name: String,
}

/// An executor's advertised identity and capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introspection {
    pub sys_info: SystemInfo,
    pub executor_info: ExecutorInfo,
    /// Advertised labels, always including os and arch.
    pub labels: Vec<String>,
}
