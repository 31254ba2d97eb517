// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-broker: executor discovery and selection.
//!
//! A broker answers tenders with contracts from every eligible
//! executor (one whose advertised labels contain the tendered labels)
//! and, on settle, hands back the transport descriptor for the chosen
//! executor. The broker returns all bidders; selection is the
//! director's job.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod fixed;
mod local;
mod service;

pub use fixed::{ExecutorEndpoint, FixedBroker};
pub use local::LocalBroker;
pub use service::{serve_request, BrokerService};

use knita_wire::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("{0}")]
    NotFound(String),

    #[error("executor unavailable: {0}")]
    Transport(#[from] knita_wire::WireError),

    #[error("{0}")]
    Internal(String),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::NotFound(_) => ErrorKind::NotFound,
            BrokerError::Transport(_) => ErrorKind::Transport,
            BrokerError::Internal(_) => ErrorKind::Internal,
        }
    }
}
