// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Build log: a sequenced event stream scoped to one build.

use crate::bus::Bus;
use crate::event::{Event, LogSource, Meta, Payload};
use crate::sequencer::Sequencer;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepublishError {
    #[error("build id mismatch: event {event} on log {log}")]
    BuildIdMismatch { event: String, log: String },
}

struct LogInner {
    bus: Bus,
    sequencer: Sequencer,
    build_id: String,
}

/// Handle for publishing into a build's event stream.
///
/// Clones share the underlying bus and sequencer; [`BuildLog::with_source`]
/// derives a handle whose log events carry a different [`LogSource`].
#[derive(Clone)]
pub struct BuildLog {
    inner: Arc<LogInner>,
    source: LogSource,
}

impl BuildLog {
    pub fn new(bus: Bus, build_id: impl Into<String>, source: LogSource) -> Self {
        let sequencer = Sequencer::new(bus.clone());
        Self {
            inner: Arc::new(LogInner {
                bus,
                sequencer,
                build_id: build_id.into(),
            }),
            source,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub fn build_id(&self) -> &str {
        &self.inner.build_id
    }

    pub fn source(&self) -> &LogSource {
        &self.source
    }

    /// A log handle whose Stdout/Stderr events carry `source`.
    pub fn with_source(&self, source: LogSource) -> BuildLog {
        BuildLog {
            inner: self.inner.clone(),
            source,
        }
    }

    /// Publishes `payload` with a fresh sequence number.
    pub fn publish(&self, payload: Payload) {
        self.inner.sequencer.publish(Event {
            meta: Meta {
                build_id: self.inner.build_id.clone(),
                sequence: 0,
                correlation: String::new(),
            },
            payload,
        });
    }

    /// Re-publishes an event received from another process, assigning a
    /// fresh local sequence number. The event must belong to this build.
    pub fn republish(&self, event: Event) -> Result<(), RepublishError> {
        if event.meta.build_id != self.inner.build_id {
            return Err(RepublishError::BuildIdMismatch {
                event: event.meta.build_id,
                log: self.inner.build_id.clone(),
            });
        }
        self.inner.sequencer.publish(event);
        Ok(())
    }

    /// Publishes a chunk of stdout bytes under this handle's source.
    pub fn stdout(&self, data: Vec<u8>) {
        self.publish(Payload::Stdout {
            data,
            source: self.source.clone(),
        });
    }

    /// Publishes a chunk of stderr bytes under this handle's source.
    pub fn stderr(&self, data: Vec<u8>) {
        self.publish(Payload::Stderr {
            data,
            source: self.source.clone(),
        });
    }

    /// Publishes a newline-terminated status line as stdout.
    pub fn print(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let mut data = message.as_bytes().to_vec();
        if !message.ends_with('\n') {
            data.push(b'\n');
        }
        self.stdout(data);
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
