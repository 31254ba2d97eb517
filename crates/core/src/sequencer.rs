// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Sequence-number assignment.

use crate::bus::Bus;
use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;

/// Stamps strictly monotonic sequence numbers onto events and forwards
/// them to the bus.
///
/// The lock is held across delivery, so publication order and sequence
/// order are the same: this is the single serialisation point for a
/// build log.
#[derive(Clone)]
pub struct Sequencer {
    bus: Bus,
    last_sequence: Arc<Mutex<u64>>,
}

impl Sequencer {
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            last_sequence: Arc::new(Mutex::new(0)),
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Assigns the next sequence number and delivers the event.
    pub fn publish(&self, mut event: Event) {
        let mut last = self.last_sequence.lock();
        *last += 1;
        event.meta.sequence = *last;
        self.bus.publish(&event);
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
