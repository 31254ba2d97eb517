// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-transfer: chunked file transfer between a local working
//! directory and a runtime working directory.
//!
//! The sender expands a source path (literal file, literal directory,
//! `dir/` contents, or glob) into (src, dest) pairs, filters them
//! through an exclude list, and emits header/body/trailer frames. The
//! receiver is a per-file state machine that materialises files and
//! directories. Import and Export share both halves; only the direction
//! differs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod fs;
mod glob;
mod receiver;
mod sender;

pub use fs::WorkFs;
pub use glob::is_glob;
pub use receiver::{ReceiveState, Receiver};
pub use sender::{FrameSink, SendOptions, Sender, SendCallback, SkipCallback};

use thiserror::Error;

pub(crate) fn new_file_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Errors raised while sending or receiving a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("src must be relative: {0}")]
    AbsoluteSrc(String),

    #[error("dest must be relative: {0}")]
    AbsoluteDest(String),

    #[error("src {0} does not exist")]
    SrcNotFound(String),

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no matches for {0}")]
    NoMatches(String),

    #[error("header expected for file {0}")]
    HeaderExpected(String),

    #[error("trailer expected for file {0}")]
    TrailerExpected(String),

    #[error("transport error: {0}")]
    Transport(String),
}
