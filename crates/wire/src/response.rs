// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Response messages and the wire error taxonomy.

use crate::transfer::FileTransfer;
use crate::types::{Contract, Introspection};
use knita_core::{Event, ExecStatus, SystemInfo};
use serde::{Deserialize, Serialize};

/// Why a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request; no side effects.
    InvalidArgument,
    /// Unknown runtime/contract id; no side effects.
    NotFound,
    /// Runtime already open, event stream already attached.
    Conflict,
    /// Dial/stream/socket failure.
    Transport,
    /// Backing-runtime or other server-side failure.
    Internal,
}

/// Reply frames. Unary calls see exactly one; streaming calls see a
/// sequence ending in the call's terminal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok,

    #[serde(rename = "error")]
    Error { kind: ErrorKind, message: String },

    // -- broker --
    #[serde(rename = "contracts")]
    Contracts { contracts: Vec<Contract> },

    #[serde(rename = "settlement")]
    Settlement { transport: crate::Transport },

    // -- executor --
    #[serde(rename = "opened")]
    Opened {
        work_directory: String,
        sys_info: SystemInfo,
    },

    #[serde(rename = "exec_result")]
    ExecResult { exit_code: i32 },

    #[serde(rename = "heartbeat")]
    Heartbeat { extended_by_ms: u64 },

    #[serde(rename = "introspection")]
    Introspection(Introspection),

    /// One event on an `executor:events` stream.
    #[serde(rename = "event")]
    Event { event: Event },

    /// One frame on an `executor:export` stream.
    #[serde(rename = "transfer")]
    Transfer { frame: FileTransfer },

    /// Terminal frame of an `executor:export` stream.
    #[serde(rename = "transfer_done")]
    TransferDone,

    // -- director --
    #[serde(rename = "runtime_opened")]
    RuntimeOpened {
        runtime_id: String,
        work_directory: String,
        sys_info: SystemInfo,
    },

    /// One frame on a `director:exec` stream.
    #[serde(rename = "exec_event")]
    ExecEvent { event: ExecStreamEvent },
}

/// Exec progress forwarded to the pattern SDK.
///
/// System-tagged output is suppressed; `End` is the terminal frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "exec")]
pub enum ExecStreamEvent {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "stdout")]
    Stdout { data: Vec<u8> },
    #[serde(rename = "stderr")]
    Stderr { data: Vec<u8> },
    #[serde(rename = "end")]
    End { status: ExecStatus },
}
