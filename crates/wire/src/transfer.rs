// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! File-transfer stream frames, shared by Import and Export.

use serde::{Deserialize, Serialize};

/// Maximum bytes of file content per body frame.
pub const CHUNK_SIZE: usize = 512 * 1024;

/// One frame of a chunked file transfer.
///
/// For each `file_id`: a header precedes any body, body offsets are
/// contiguous from zero, and a trailer terminates the file. Directories
/// carry header + trailer only. A single `transfer_id` may interleave
/// frames from multiple `file_id`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransfer {
    pub runtime_id: String,
    pub transfer_id: String,
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<FileHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<FileBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<FileTrailer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub is_dir: bool,
    pub src_path: String,
    pub dest_path: String,
    /// Unix permission bits.
    pub mode: u32,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBody {
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTrailer {
    /// Declared but not produced by the sender; receivers log and
    /// otherwise ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<Vec<u8>>,
}
