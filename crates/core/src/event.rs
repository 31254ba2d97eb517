// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Typed build events.
//!
//! Every event carries [`Meta`] (build id, sequence number, optional
//! correlation name) and a tagged [`Payload`]. Serializes with
//! `{"type": "domain:name", ...fields}` format.

use crate::opts::{ExecOpts, RuntimeOpts};
use serde::{Deserialize, Serialize};

/// Metadata stamped onto every event.
///
/// `sequence` is assigned by the [`crate::Sequencer`] at publish time and
/// is strictly monotonic within one build log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub build_id: String,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correlation: String,
}

/// A sequenced build event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub meta: Meta,
    pub payload: Payload,
}

/// Outcome carried by lifecycle End events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Status {
    Result,
    Error { message: String },
}

impl Status {
    pub fn from_result<T, E: std::fmt::Display>(res: &Result<T, E>) -> Self {
        match res {
            Ok(_) => Status::Result,
            Err(e) => Status::Error { message: e.to_string() },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }
}

/// Outcome of an exec. A non-zero exit code is a `Result`, not an
/// `Error`; errors are reserved for infrastructure failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecStatus {
    Result { exit_code: i32 },
    Error { message: String },
}

/// Where a log event originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum LogSource {
    Director,
    Runtime {
        runtime_id: String,
    },
    Exec {
        runtime_id: String,
        exec_id: String,
        /// System output (e.g. "Executing command: ...") as opposed to
        /// bytes written by the user's command.
        system: bool,
    },
}

impl LogSource {
    pub fn runtime_id(&self) -> Option<&str> {
        match self {
            LogSource::Director => None,
            LogSource::Runtime { runtime_id } | LogSource::Exec { runtime_id, .. } => {
                Some(runtime_id)
            }
        }
    }
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    // -- build --
    #[serde(rename = "build:start")]
    BuildStart { build_id: String },

    #[serde(rename = "build:end")]
    BuildEnd { build_id: String, status: Status },

    // -- tender / settlement --
    #[serde(rename = "runtime:tender:start")]
    RuntimeTenderStart { tender_id: String, opts: RuntimeOpts },

    #[serde(rename = "runtime:tender:end")]
    RuntimeTenderEnd { tender_id: String, status: Status },

    #[serde(rename = "runtime:settlement:start")]
    RuntimeSettlementStart {
        tender_id: String,
        contract_id: String,
        runtime_id: String,
    },

    #[serde(rename = "runtime:settlement:end")]
    RuntimeSettlementEnd {
        tender_id: String,
        contract_id: String,
        runtime_id: String,
        status: Status,
    },

    // -- runtime lifecycle --
    #[serde(rename = "runtime:open:start")]
    RuntimeOpenStart { runtime_id: String, opts: RuntimeOpts },

    #[serde(rename = "runtime:open:end")]
    RuntimeOpenEnd { runtime_id: String, status: Status },

    #[serde(rename = "runtime:close:start")]
    RuntimeCloseStart { runtime_id: String },

    #[serde(rename = "runtime:close:end")]
    RuntimeCloseEnd { runtime_id: String, status: Status },

    // -- exec --
    #[serde(rename = "exec:start")]
    ExecStart {
        runtime_id: String,
        exec_id: String,
        opts: ExecOpts,
    },

    #[serde(rename = "exec:end")]
    ExecEnd {
        runtime_id: String,
        exec_id: String,
        status: ExecStatus,
    },

    // -- file transfer --
    #[serde(rename = "import:start")]
    ImportStart { runtime_id: String, import_id: String },

    #[serde(rename = "import:end")]
    ImportEnd {
        runtime_id: String,
        import_id: String,
        status: Status,
    },

    #[serde(rename = "export:start")]
    ExportStart { runtime_id: String, export_id: String },

    #[serde(rename = "export:end")]
    ExportEnd {
        runtime_id: String,
        export_id: String,
        status: Status,
    },

    // -- log --
    #[serde(rename = "log:stdout")]
    Stdout { data: Vec<u8>, source: LogSource },

    #[serde(rename = "log:stderr")]
    Stderr { data: Vec<u8>, source: LogSource },

    // -- coordination --
    #[serde(rename = "sync:point")]
    SyncPointReached { barrier_id: String },
}

impl Payload {
    /// The runtime this event is about, if it is runtime-scoped.
    ///
    /// This is the predicate behind per-runtime event streams: an event
    /// with a matching runtime id belongs on that runtime's stream.
    pub fn runtime_id(&self) -> Option<&str> {
        match self {
            Payload::RuntimeSettlementStart { runtime_id, .. }
            | Payload::RuntimeSettlementEnd { runtime_id, .. }
            | Payload::RuntimeOpenStart { runtime_id, .. }
            | Payload::RuntimeOpenEnd { runtime_id, .. }
            | Payload::RuntimeCloseStart { runtime_id }
            | Payload::RuntimeCloseEnd { runtime_id, .. }
            | Payload::ExecStart { runtime_id, .. }
            | Payload::ExecEnd { runtime_id, .. }
            | Payload::ImportStart { runtime_id, .. }
            | Payload::ImportEnd { runtime_id, .. }
            | Payload::ExportStart { runtime_id, .. }
            | Payload::ExportEnd { runtime_id, .. } => Some(runtime_id),
            Payload::Stdout { source, .. } | Payload::Stderr { source, .. } => source.runtime_id(),
            _ => None,
        }
    }

    /// Short name for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Payload::BuildStart { .. } => "build:start",
            Payload::BuildEnd { .. } => "build:end",
            Payload::RuntimeTenderStart { .. } => "runtime:tender:start",
            Payload::RuntimeTenderEnd { .. } => "runtime:tender:end",
            Payload::RuntimeSettlementStart { .. } => "runtime:settlement:start",
            Payload::RuntimeSettlementEnd { .. } => "runtime:settlement:end",
            Payload::RuntimeOpenStart { .. } => "runtime:open:start",
            Payload::RuntimeOpenEnd { .. } => "runtime:open:end",
            Payload::RuntimeCloseStart { .. } => "runtime:close:start",
            Payload::RuntimeCloseEnd { .. } => "runtime:close:end",
            Payload::ExecStart { .. } => "exec:start",
            Payload::ExecEnd { .. } => "exec:end",
            Payload::ImportStart { .. } => "import:start",
            Payload::ImportEnd { .. } => "import:end",
            Payload::ExportStart { .. } => "export:start",
            Payload::ExportEnd { .. } => "export:end",
            Payload::Stdout { .. } => "log:stdout",
            Payload::Stderr { .. } => "log:stderr",
            Payload::SyncPointReached { .. } => "sync:point",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
