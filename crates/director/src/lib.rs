// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-director: the per-build coordinator embedded in the CLI.
//!
//! A [`Build`] acquires runtimes through a broker (tender, settle),
//! attaches to the settled executor's event stream, and exposes
//! [`RuntimeHandle`]s whose operations pair every state change with a
//! sync-point barrier. The [`Server`] re-exposes those handles to the
//! pattern subprocess over the CLI socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod build;
mod runtime;
mod server;

#[cfg(test)]
mod test_support;

pub use build::Build;
pub use runtime::RuntimeHandle;
pub use server::Server;

use knita_wire::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("no runtime contracts received; unable to locate an executor to host the runtime")]
    NoExecutorAvailable,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("runtime not found: {0}")]
    NotFound(String),

    #[error("runtime cancelled")]
    Cancelled,

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error(transparent)]
    Wire(#[from] knita_wire::WireError),

    #[error(transparent)]
    Transfer(#[from] knita_transfer::TransferError),
}

impl DirectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectorError::NoExecutorAvailable => ErrorKind::NotFound,
            DirectorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DirectorError::NotFound(_) => ErrorKind::NotFound,
            DirectorError::Cancelled => ErrorKind::Internal,
            DirectorError::UnexpectedReply(_) => ErrorKind::Transport,
            DirectorError::Wire(knita_wire::WireError::Remote { kind, .. }) => *kind,
            DirectorError::Wire(_) => ErrorKind::Transport,
            DirectorError::Transfer(_) => ErrorKind::Internal,
        }
    }
}
