// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Executor error taxonomy.

use knita_wire::{ErrorKind, WireError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Malformed request; rejected before any state change.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Backing-runtime failure: container start, command spawn, etc.
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Transfer(#[from] knita_transfer::TransferError),
}

impl ExecutorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ExecutorError::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ExecutorError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ExecutorError::Conflict(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ExecutorError::Runtime(message.into())
    }

    /// The wire error kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ExecutorError::NotFound(_) => ErrorKind::NotFound,
            ExecutorError::Conflict(_) => ErrorKind::Conflict,
            ExecutorError::Runtime(_) => ErrorKind::Internal,
            ExecutorError::Io(_) => ErrorKind::Internal,
            ExecutorError::Wire(_) => ErrorKind::Transport,
            ExecutorError::Transfer(_) => ErrorKind::Internal,
        }
    }
}
