// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Runtime lifecycle supervision.
//!
//! Runtimes move through exactly one Prepared → Open transition and end
//! Closed. A closed runtime id never re-opens. The watchdog closes any
//! open runtime whose deadline has passed; heartbeats push the deadline
//! out.

use crate::runtime::{Runtime, RuntimeFactory};
use crate::ExecutorError;
use knita_core::{Bus, BuildLog, LogSource, Payload, RuntimeOpts, Status};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// How far each heartbeat pushes a runtime's deadline out.
pub const DEADLINE_EXTENSION: Duration = Duration::from_secs(120);

/// A runtime whose event stream is attached but which has not been
/// opened yet.
pub struct Prepared {
    log: BuildLog,
    cancel: CancellationToken,
    open_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Prepared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prepared").finish_non_exhaustive()
    }
}

impl Prepared {
    /// Event log scoped to this runtime; the Events stream subscribes
    /// to its bus.
    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Cancelled when the runtime closes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// An open runtime and its reaping deadline.
pub struct OpenRuntime {
    runtime: Box<dyn Runtime>,
    cancel: CancellationToken,
    deadline: Mutex<Instant>,
}

impl std::fmt::Debug for OpenRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRuntime").finish_non_exhaustive()
    }
}

impl OpenRuntime {
    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.lock()
    }

    fn set_deadline(&self, deadline: Instant) {
        *self.deadline.lock() = deadline;
    }
}

#[derive(Default)]
struct Maps {
    prepared: HashMap<String, Arc<Prepared>>,
    open: HashMap<String, Arc<OpenRuntime>>,
}

struct Inner {
    factory: Box<dyn RuntimeFactory>,
    extension: Duration,
    maps: RwLock<Maps>,
    cancel: CancellationToken,
    wake: Notify,
}

/// Owns every runtime hosted by one executor.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(factory: Box<dyn RuntimeFactory>) -> Self {
        Self::with_extension(factory, DEADLINE_EXTENSION)
    }

    /// Test hook: a short extension makes deadline expiry observable.
    pub fn with_extension(factory: Box<dyn RuntimeFactory>, extension: Duration) -> Self {
        let sup = Self {
            inner: Arc::new(Inner {
                factory,
                extension,
                maps: RwLock::new(Maps::default()),
                cancel: CancellationToken::new(),
                wake: Notify::new(),
            }),
        };
        sup.spawn_watchdog();
        sup
    }

    pub fn extension(&self) -> Duration {
        self.inner.extension
    }

    /// Records the intent to open a runtime and creates its event bus.
    /// Fails if a prepared or open runtime with this id already exists.
    pub fn prepare(
        &self,
        build_id: &str,
        runtime_id: &str,
    ) -> Result<Arc<Prepared>, ExecutorError> {
        let mut maps = self.inner.maps.write();
        if maps.prepared.contains_key(runtime_id) || maps.open.contains_key(runtime_id) {
            return Err(ExecutorError::conflict(format!(
                "runtime {runtime_id} already exists"
            )));
        }
        let log = BuildLog::new(
            Bus::new(),
            build_id,
            LogSource::Runtime {
                runtime_id: runtime_id.to_string(),
            },
        );
        let prepared = Arc::new(Prepared {
            log,
            cancel: self.inner.cancel.child_token(),
            open_lock: tokio::sync::Mutex::new(()),
        });
        maps.prepared.insert(runtime_id.to_string(), prepared.clone());
        Ok(prepared)
    }

    /// Opens a prepared runtime: creates the backing resources, sets
    /// the first deadline, and publishes RuntimeOpen start/end events.
    pub async fn open(
        &self,
        runtime_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Arc<OpenRuntime>, ExecutorError> {
        let prepared = {
            let maps = self.inner.maps.read();
            maps.prepared
                .get(runtime_id)
                .cloned()
                .ok_or_else(|| ExecutorError::not_found(format!("runtime {runtime_id} is not prepared")))?
        };
        let _guard = prepared.open_lock.try_lock().map_err(|_| {
            ExecutorError::conflict(format!("runtime {runtime_id} is already being opened"))
        })?;

        prepared.log.publish(Payload::RuntimeOpenStart {
            runtime_id: runtime_id.to_string(),
            opts: opts.clone(),
        });
        let result = self.create_and_start(&prepared, runtime_id, opts).await;
        prepared.log.publish(Payload::RuntimeOpenEnd {
            runtime_id: runtime_id.to_string(),
            status: Status::from_result(&result),
        });

        match result {
            Ok(runtime) => {
                let state = Arc::new(OpenRuntime {
                    runtime,
                    cancel: prepared.cancel.clone(),
                    deadline: Mutex::new(Instant::now() + self.inner.extension),
                });
                let mut maps = self.inner.maps.write();
                maps.prepared.remove(runtime_id);
                maps.open.insert(runtime_id.to_string(), state.clone());
                drop(maps);
                self.inner.wake.notify_one();
                Ok(state)
            }
            Err(e) => {
                // Prepared state is torn down on any failure; the End
                // event above reaches the stream before the cancel.
                self.inner.maps.write().prepared.remove(runtime_id);
                prepared.cancel.cancel();
                Err(e)
            }
        }
    }

    async fn create_and_start(
        &self,
        prepared: &Prepared,
        runtime_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Box<dyn Runtime>, ExecutorError> {
        let mut runtime = self
            .inner
            .factory
            .create(prepared.log.clone(), runtime_id, opts)
            .await?;
        if let Err(e) = runtime.start().await {
            let _ = runtime.close().await;
            return Err(e);
        }
        Ok(runtime)
    }

    /// The open runtime with this id.
    pub fn get(&self, runtime_id: &str) -> Result<Arc<OpenRuntime>, ExecutorError> {
        self.inner
            .maps
            .read()
            .open
            .get(runtime_id)
            .cloned()
            .ok_or_else(|| ExecutorError::not_found(format!("runtime {runtime_id} not found")))
    }

    /// Pushes the runtime's deadline out by one extension period.
    pub fn extend(&self, runtime_id: &str) -> Result<Duration, ExecutorError> {
        let state = self.get(runtime_id)?;
        let deadline = Instant::now() + self.inner.extension;
        state.set_deadline(deadline);
        self.inner.wake.notify_one();
        tracing::debug!(runtime_id, ?deadline, "extended runtime deadline");
        Ok(self.inner.extension)
    }

    /// Closes an open runtime: removes it, tears down the backing
    /// resources, and publishes RuntimeClose start/end events plus the
    /// sync point when a barrier id is given. A second close of the
    /// same id fails not-found.
    pub async fn close_runtime(
        &self,
        runtime_id: &str,
        barrier_id: Option<&str>,
    ) -> Result<(), ExecutorError> {
        // Removal under the write lock picks a single winner between
        // concurrent closes (RPC, watchdog, stream teardown).
        let state = {
            let mut maps = self.inner.maps.write();
            match maps.open.remove(runtime_id) {
                Some(state) => {
                    maps.prepared.remove(runtime_id);
                    state
                }
                None => {
                    return Err(ExecutorError::not_found(format!(
                        "runtime {runtime_id} not found"
                    )))
                }
            }
        };
        let log = state.runtime.log().clone();
        log.publish(Payload::RuntimeCloseStart {
            runtime_id: runtime_id.to_string(),
        });
        let result = state.runtime.close().await;
        log.publish(Payload::RuntimeCloseEnd {
            runtime_id: runtime_id.to_string(),
            status: Status::from_result(&result),
        });
        if let Some(barrier_id) = barrier_id {
            log.publish(Payload::SyncPointReached {
                barrier_id: barrier_id.to_string(),
            });
        }
        // Cancelled after the events above, so the stream drains them.
        state.cancel.cancel();
        result
    }

    /// Discards a runtime that never opened (its event stream ended).
    pub fn discard_prepared(&self, runtime_id: &str) {
        let removed = self.inner.maps.write().prepared.remove(runtime_id);
        if let Some(prepared) = removed {
            prepared.cancel.cancel();
        }
    }

    /// True if the id refers to a prepared (not yet open) runtime.
    pub fn is_prepared(&self, runtime_id: &str) -> bool {
        self.inner.maps.read().prepared.contains_key(runtime_id)
    }

    /// Stops the supervisor and closes every runtime.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let open_ids: Vec<String> = self.inner.maps.read().open.keys().cloned().collect();
        for id in open_ids {
            tracing::info!(runtime_id = %id, "closing runtime");
            if let Err(e) = self.close_runtime(&id, None).await {
                tracing::error!(runtime_id = %id, error = %e, "ignoring error closing runtime");
            }
        }
        let prepared: Vec<Arc<Prepared>> =
            self.inner.maps.write().prepared.drain().map(|(_, p)| p).collect();
        for p in prepared {
            p.cancel.cancel();
        }
    }

    /// Scans open runtimes, closing any whose deadline has passed.
    /// Sleeps until the earliest upcoming deadline, bounded by one
    /// extension period, and re-evaluates on every heartbeat.
    fn spawn_watchdog(&self) {
        let sup = self.clone();
        tokio::spawn(async move {
            loop {
                let now = Instant::now();
                let mut expired = Vec::new();
                let mut wake_in = sup.inner.extension;
                {
                    let maps = sup.inner.maps.read();
                    for (id, state) in &maps.open {
                        let deadline = state.deadline();
                        if deadline <= now {
                            expired.push(id.clone());
                        } else {
                            wake_in = wake_in.min(deadline - now);
                        }
                    }
                }
                for id in expired {
                    tracing::warn!(runtime_id = %id, "runtime has deadlined");
                    if let Err(e) = sup.close_runtime(&id, None).await {
                        tracing::warn!(runtime_id = %id, error = %e, "ignoring error closing deadlined runtime");
                    }
                }
                tokio::select! {
                    _ = sup.inner.cancel.cancelled() => return,
                    _ = sup.inner.wake.notified() => {}
                    _ = tokio::time::sleep(wake_in) => {}
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
