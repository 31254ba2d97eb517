// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-wire: the RPC protocol spoken between the director, broker,
//! and executors.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//! Every RPC runs on its own connection; streaming calls are sequences
//! of frames on that connection.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod request;
mod response;
mod transfer;
mod transport;
mod types;

pub use frame::{decode, encode, read_message, write_message, MAX_FRAME_LEN};
pub use request::{ImportFrame, Request};
pub use response::{ErrorKind, ExecStreamEvent, Response};
pub use transfer::{FileBody, FileHeader, FileTrailer, FileTransfer, CHUNK_SIZE};
pub use transport::{dial, Client, Connection, Listener, Transport, DIAL_TIMEOUT};
pub use types::{Contract, ExecutorInfo, Introspection};

use thiserror::Error;

/// Errors produced while speaking the wire protocol.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(serde_json::Error),

    #[error("decode error: {0}")]
    Decode(serde_json::Error),

    #[error("frame of {0} bytes exceeds maximum")]
    FrameTooLarge(usize),

    #[error("connection closed mid-frame")]
    UnexpectedEof,

    #[error("connection closed before a reply arrived")]
    MissingReply,

    #[error("unexpected message for this call")]
    UnexpectedMessage,

    #[error("dial timed out after {0:?}")]
    DialTimeout(std::time::Duration),

    #[error("{kind:?}: {message}")]
    Remote { kind: ErrorKind, message: String },
}

impl WireError {
    /// Remote error of the given kind, for servers failing a request.
    pub fn remote(kind: ErrorKind, message: impl Into<String>) -> Self {
        WireError::Remote { kind, message: message.into() }
    }
}
