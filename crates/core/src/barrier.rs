// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Sync-point barriers.
//!
//! A barrier reconciles a unary RPC reply with the event stream that
//! describes the same operation: the callee publishes
//! `SyncPointReached(barrier_id)` after every event belonging to the
//! operation, and the caller waits on the barrier before treating the
//! RPC as complete.

use crate::bus::{Bus, Unsubscribe};
use crate::event::Payload;
use crate::id::new_id;
use std::sync::Arc;
use tokio::sync::Notify;

/// One-shot latch keyed by a fresh barrier id.
///
/// Dropping the barrier unsubscribes; a late `SyncPointReached` with no
/// subscriber is discarded harmlessly.
pub struct Barrier {
    id: String,
    notify: Arc<Notify>,
    subscription: Unsubscribe,
}

impl Barrier {
    /// Subscribes on `bus` for this barrier's sync-point event.
    ///
    /// The subscription is installed before the caller issues the
    /// triggering RPC, so the sync point cannot be missed.
    pub fn new(bus: &Bus) -> Self {
        let id = new_id();
        let notify = Arc::new(Notify::new());
        let matched = id.clone();
        let notified = notify.clone();
        let subscription = bus.subscribe_filtered(
            move |_| notified.notify_one(),
            move |e| {
                matches!(&e.payload, Payload::SyncPointReached { barrier_id } if *barrier_id == matched)
            },
        );
        Self { id, notify, subscription }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits until the sync point has been delivered.
    ///
    /// Cancel-safe: callers race this against their own context.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
