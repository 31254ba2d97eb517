// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Request messages for the broker, executor, and director services.

use crate::transfer::FileTransfer;
use crate::types::Contract;
use knita_core::{ExecOpts, RuntimeOpts};
use serde::{Deserialize, Serialize};

/// The first frame of every connection: one RPC request.
///
/// Serializes with `{"method": "service:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    // -- broker --
    #[serde(rename = "broker:tender")]
    Tender {
        build_id: String,
        tender_id: String,
        opts: RuntimeOpts,
    },

    #[serde(rename = "broker:settle")]
    Settle { contract: Contract },

    // -- executor --
    /// Opens the per-runtime event stream. The server replies with
    /// [`crate::Response::Event`] frames until the connection closes.
    #[serde(rename = "executor:events")]
    Events {
        build_id: String,
        runtime_id: String,
        barrier_id: String,
    },

    #[serde(rename = "executor:open")]
    Open {
        build_id: String,
        runtime_id: String,
        opts: RuntimeOpts,
    },

    #[serde(rename = "executor:exec")]
    Exec {
        runtime_id: String,
        exec_id: String,
        barrier_id: String,
        opts: ExecOpts,
    },

    /// Begins a client-stream of [`ImportFrame`]s.
    #[serde(rename = "executor:import")]
    Import,

    /// The server replies with [`crate::Response::Transfer`] frames and a
    /// terminal [`crate::Response::TransferDone`].
    #[serde(rename = "executor:export")]
    Export {
        runtime_id: String,
        export_id: String,
        src_path: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        dest_path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<String>,
    },

    #[serde(rename = "executor:heartbeat")]
    Heartbeat { runtime_id: String },

    #[serde(rename = "executor:close")]
    Close {
        runtime_id: String,
        barrier_id: String,
    },

    #[serde(rename = "executor:introspect")]
    Introspect,

    // -- director (pattern SDK surface) --
    #[serde(rename = "director:open")]
    DirectorOpen { build_id: String, opts: RuntimeOpts },

    /// The server replies with [`crate::Response::ExecEvent`] frames; the
    /// terminal frame carries the exec's end status.
    #[serde(rename = "director:exec")]
    DirectorExec { runtime_id: String, opts: ExecOpts },

    #[serde(rename = "director:import")]
    DirectorImport {
        runtime_id: String,
        src_path: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        dest_path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<String>,
    },

    #[serde(rename = "director:export")]
    DirectorExport {
        runtime_id: String,
        src_path: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        dest_path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<String>,
    },

    #[serde(rename = "director:close")]
    DirectorClose { runtime_id: String },
}

/// Frames following an [`Request::Import`] on the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame")]
pub enum ImportFrame {
    #[serde(rename = "transfer")]
    Transfer(FileTransfer),
    /// Marks the end of the stream; the server acks once every file has
    /// been fully received.
    #[serde(rename = "commit")]
    Commit,
}
