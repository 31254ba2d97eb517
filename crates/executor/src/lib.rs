// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-executor: hosts runtimes and serves the executor RPC surface.
//!
//! The supervisor tracks prepared and open runtimes; the server
//! dispatches Events/Open/Exec/Import/Export/Heartbeat/Close/Introspect
//! over the framed protocol; host and docker runtimes provide the
//! isolated working environments.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
mod error;
pub mod runtime;
mod server;
mod supervisor;
mod validate;

pub use error::ExecutorError;
pub use server::{Config, Server};
pub use supervisor::{Supervisor, DEADLINE_EXTENSION};
