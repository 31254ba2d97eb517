// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! knita-core: event model, pub/sub bus, sequencing, and sync-point
//! barriers shared by the director, broker, and executor.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod barrier;
pub mod bus;
pub mod event;
pub mod id;
pub mod labels;
pub mod log;
pub mod opts;
pub mod sequencer;
pub mod system;

pub use barrier::Barrier;
pub use bus::{Bus, Unsubscribe};
pub use event::{Event, ExecStatus, LogSource, Meta, Payload, Status};
pub use id::new_id;
pub use labels::is_subset;
pub use log::{BuildLog, RepublishError};
pub use opts::{
    DockerOpts, DockerPullAuth, DockerPullOpts, ExecOpts, PullStrategy, RuntimeOpts, RuntimeType,
};
pub use sequencer::Sequencer;
pub use system::SystemInfo;
