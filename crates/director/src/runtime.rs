// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Remote runtime handle.
//!
//! The handle owns two background tasks: the event-forwarding task
//! drains the executor's event stream into the local build log, and
//! the keepalive task heartbeats the runtime's deadline. Closing the
//! handle cancels and joins both.

use crate::DirectorError;
use knita_core::{new_id, Barrier, BuildLog, Event, ExecOpts, Payload, RuntimeOpts, Status, SystemInfo};
use knita_transfer::{FrameSink, Receiver, SendOptions, Sender, TransferError, WorkFs};
use knita_wire::{Client, Connection, ImportFrame, Request, Response};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Heartbeat RPC timeout.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
/// Retry interval after a failed heartbeat.
const HEARTBEAT_RETRY: Duration = Duration::from_secs(5);
/// Wait for the executor's subscriber-installed sync point.
const EVENTS_ATTACH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RuntimeHandle {
    build_id: String,
    runtime_id: String,
    opts: RuntimeOpts,
    client: Client,
    log: BuildLog,
    local_fs: WorkFs,
    remote_work_directory: String,
    sys_info: SystemInfo,
    cancel: CancellationToken,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("build_id", &self.build_id)
            .field("runtime_id", &self.runtime_id)
            .finish_non_exhaustive()
    }
}

impl RuntimeHandle {
    /// Attaches the event stream, waits for its sync point (so the
    /// subscriber is provably installed), then opens the runtime and
    /// starts the keepalive loop.
    pub(crate) async fn open(
        log: BuildLog,
        build_id: &str,
        runtime_id: String,
        client: Client,
        local_fs: WorkFs,
        opts: RuntimeOpts,
    ) -> Result<Self, DirectorError> {
        let barrier_id = new_id();
        let mut events = client
            .stream(&Request::Events {
                build_id: build_id.to_string(),
                runtime_id: runtime_id.clone(),
                barrier_id: barrier_id.clone(),
            })
            .await?;

        // Republish inline until the attach sync point arrives; only
        // then is the executor-side subscriber guaranteed installed.
        let attach = async {
            loop {
                match events.recv_response().await? {
                    Response::Event { event } => {
                        let is_sync = matches!(
                            &event.payload,
                            Payload::SyncPointReached { barrier_id: b } if *b == barrier_id
                        );
                        republish(&log, event);
                        if is_sync {
                            return Ok::<(), DirectorError>(());
                        }
                    }
                    other => return Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
                }
            }
        };
        tokio::time::timeout(EVENTS_ATTACH_TIMEOUT, attach)
            .await
            .map_err(|_| {
                DirectorError::UnexpectedReply("timed out waiting for event stream".to_string())
            })??;
        tracing::info!(%runtime_id, "started streaming runtime events");

        let cancel = CancellationToken::new();
        let forward = tokio::spawn(forward_events(events, log.clone(), cancel.clone()));

        tracing::info!(%runtime_id, "opening remote runtime");
        let opened = client
            .unary(&Request::Open {
                build_id: build_id.to_string(),
                runtime_id: runtime_id.clone(),
                opts: opts.clone(),
            })
            .await;
        let (work_directory, sys_info) = match opened {
            Ok(Response::Opened { work_directory, sys_info }) => (work_directory, sys_info),
            Ok(other) => {
                abandon_forwarder(forward, &cancel).await;
                return Err(DirectorError::UnexpectedReply(format!("{other:?}")));
            }
            Err(e) => {
                abandon_forwarder(forward, &cancel).await;
                return Err(e.into());
            }
        };
        tracing::info!(%runtime_id, %work_directory, "opened runtime");

        let keepalive = tokio::spawn(keepalive(
            client.clone(),
            runtime_id.clone(),
            cancel.clone(),
        ));
        Ok(Self {
            build_id: build_id.to_string(),
            runtime_id,
            opts,
            client,
            log,
            local_fs,
            remote_work_directory: work_directory,
            sys_info,
            cancel,
            tasks: Mutex::new(vec![forward, keepalive]),
        })
    }

    pub fn id(&self) -> &str {
        &self.runtime_id
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn opts(&self) -> &RuntimeOpts {
        &self.opts
    }

    pub fn sys_info(&self) -> &SystemInfo {
        &self.sys_info
    }

    /// The runtime's working directory, optionally joined with `path`.
    pub fn work_directory(&self, path: &str) -> String {
        if path.is_empty() {
            self.remote_work_directory.clone()
        } else {
            format!("{}/{}", self.remote_work_directory.trim_end_matches('/'), path)
        }
    }

    /// Runs a command, returning its exit code once every event
    /// belonging to the exec has been observed locally.
    pub async fn exec(&self, opts: ExecOpts) -> Result<i32, DirectorError> {
        self.exec_with_id(&new_id(), opts).await
    }

    /// Like [`RuntimeHandle::exec`] with a caller-chosen exec id, so
    /// callers can subscribe for the exec's events up front.
    pub async fn exec_with_id(&self, exec_id: &str, opts: ExecOpts) -> Result<i32, DirectorError> {
        let barrier = Barrier::new(self.log.bus());
        let reply = self
            .client
            .unary(&Request::Exec {
                runtime_id: self.runtime_id.clone(),
                exec_id: exec_id.to_string(),
                barrier_id: barrier.id().to_string(),
                opts,
            })
            .await?;
        let exit_code = match reply {
            Response::ExecResult { exit_code } => exit_code,
            other => return Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
        };
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(DirectorError::Cancelled),
            _ = barrier.wait() => {}
        }
        Ok(exit_code)
    }

    /// Imports files from the local working directory into the
    /// runtime, publishing Import start/end events.
    pub async fn import(
        &self,
        src: &str,
        dest: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        let import_id = new_id();
        self.log.publish(Payload::ImportStart {
            runtime_id: self.runtime_id.clone(),
            import_id: import_id.clone(),
        });
        let result = self.import_inner(&import_id, src, dest, excludes).await;
        self.log.publish(Payload::ImportEnd {
            runtime_id: self.runtime_id.clone(),
            import_id,
            status: Status::from_result(&result),
        });
        result
    }

    async fn import_inner(
        &self,
        import_id: &str,
        src: &str,
        dest: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        let mut conn = self.client.stream(&Request::Import).await?;
        tracing::info!(src, dest, "import stream opened");
        {
            let mut sink = ImportSink { conn: &mut conn };
            let mut sender = Sender::new(
                self.local_fs.clone(),
                &mut sink,
                self.runtime_id.clone(),
                import_id,
                SendOptions {
                    dest: dest.to_string(),
                    excludes,
                    ..Default::default()
                },
            )?;
            sender.send(src).await?;
        }
        conn.send(&ImportFrame::Commit).await?;
        match conn.recv_response().await? {
            Response::Ok => Ok(()),
            other => Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Exports files from the runtime into the local working
    /// directory, publishing Export start/end events.
    pub async fn export(
        &self,
        src: &str,
        dest: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        let export_id = new_id();
        self.log.publish(Payload::ExportStart {
            runtime_id: self.runtime_id.clone(),
            export_id: export_id.clone(),
        });
        let result = self.export_inner(&export_id, src, dest, excludes).await;
        self.log.publish(Payload::ExportEnd {
            runtime_id: self.runtime_id.clone(),
            export_id,
            status: Status::from_result(&result),
        });
        result
    }

    async fn export_inner(
        &self,
        export_id: &str,
        src: &str,
        dest: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        let mut conn = self
            .client
            .stream(&Request::Export {
                runtime_id: self.runtime_id.clone(),
                export_id: export_id.to_string(),
                src_path: src.to_string(),
                dest_path: dest.to_string(),
                excludes,
            })
            .await?;
        tracing::info!(src, dest, "export stream opened");
        let mut receivers: HashMap<String, Receiver> = HashMap::new();
        loop {
            match conn.recv_response().await? {
                Response::Transfer { frame } => {
                    let receiver = receivers
                        .entry(frame.file_id.clone())
                        .or_insert_with(|| Receiver::new(self.local_fs.clone()));
                    let result = receiver.next(&frame).await;
                    if receiver.is_done() {
                        receivers.remove(&frame.file_id);
                    }
                    result?;
                }
                Response::TransferDone => return Ok(()),
                other => return Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
            }
        }
    }

    /// Closes the runtime, waits for its close events to land in the
    /// local log, and reaps the background tasks.
    pub async fn close(&self) -> Result<(), DirectorError> {
        let barrier = Barrier::new(self.log.bus());
        let result = self
            .client
            .unary(&Request::Close {
                runtime_id: self.runtime_id.clone(),
                barrier_id: barrier.id().to_string(),
            })
            .await;
        if result.is_ok() {
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = barrier.wait() => {}
            }
        }
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        result?;
        Ok(())
    }
}

/// The executor tears a failed runtime's stream down after publishing
/// its End{Error} event; give the forwarder a moment to drain it
/// before cancelling outright.
async fn abandon_forwarder(
    mut forward: tokio::task::JoinHandle<()>,
    cancel: &CancellationToken,
) {
    if tokio::time::timeout(Duration::from_secs(5), &mut forward).await.is_err() {
        cancel.cancel();
        let _ = forward.await;
    }
}

fn republish(log: &BuildLog, event: Event) {
    if let Err(e) = log.republish(event) {
        tracing::error!(error = %e, "dropping foreign event");
    }
}

/// Drains the executor's event stream into the local build log,
/// assigning fresh local sequence numbers.
async fn forward_events(mut events: Connection, log: BuildLog, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            frame = events.recv::<Response>() => match frame {
                Ok(Some(Response::Event { event })) => {
                    tracing::trace!(event = event.payload.name(), sequence = event.meta.sequence, "event received");
                    republish(&log, event);
                }
                Ok(Some(other)) => {
                    tracing::warn!(frame = ?other, "unexpected frame on event stream");
                }
                Ok(None) => {
                    tracing::info!("event stream closed");
                    return;
                }
                Err(e) => {
                    tracing::info!(error = %e, "event stream closed");
                    return;
                }
            },
        }
    }
}

/// A third of the default deadline extension; each heartbeat reply
/// re-derives the interval from the executor's actual extension.
const INITIAL_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(40);

/// Heartbeats every extension/3, resetting to a 5s retry while the
/// executor is unreachable.
async fn keepalive(client: Client, runtime_id: String, cancel: CancellationToken) {
    let mut interval = INITIAL_HEARTBEAT_INTERVAL;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        let request = Request::Heartbeat {
            runtime_id: runtime_id.clone(),
        };
        let heartbeat = client.unary(&request);
        match tokio::time::timeout(HEARTBEAT_TIMEOUT, heartbeat).await {
            Ok(Ok(Response::Heartbeat { extended_by_ms })) => {
                interval = Duration::from_millis(extended_by_ms / 3);
            }
            Ok(Ok(other)) => {
                tracing::warn!(reply = ?other, "unexpected heartbeat reply");
                interval = HEARTBEAT_RETRY;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "heartbeat failed");
                interval = HEARTBEAT_RETRY;
            }
            Err(_) => {
                tracing::warn!("heartbeat timed out");
                interval = HEARTBEAT_RETRY;
            }
        }
    }
}

struct ImportSink<'a> {
    conn: &'a mut Connection,
}

#[async_trait::async_trait]
impl FrameSink for ImportSink<'_> {
    async fn send_frame(&mut self, frame: knita_wire::FileTransfer) -> Result<(), TransferError> {
        self.conn
            .send(&ImportFrame::Transfer(frame))
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
