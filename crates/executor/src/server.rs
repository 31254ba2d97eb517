// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Executor RPC surface.

use crate::runtime::DefaultRuntimeFactory;
use crate::supervisor::{OpenRuntime, Supervisor};
use crate::validate::*;
use crate::ExecutorError;
use knita_core::{ExecOpts, ExecStatus, Payload, RuntimeOpts, SystemInfo};
use knita_transfer::{FrameSink, Receiver, SendOptions, Sender, TransferError};
use knita_wire::{
    Connection, ExecutorInfo, ImportFrame, Introspection, Listener, Request, Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Executor identity and advertised labels.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub name: String,
    pub labels: Vec<String>,
}

/// Serves the executor RPC surface over a [`Listener`].
#[derive(Clone)]
pub struct Server {
    config: Arc<Config>,
    supervisor: Supervisor,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self::with_supervisor(config, Supervisor::new(Box::new(DefaultRuntimeFactory)))
    }

    /// Test hook: inject a supervisor with a custom factory or a short
    /// deadline extension.
    pub fn with_supervisor(config: Config, supervisor: Supervisor) -> Self {
        Self {
            config: Arc::new(config),
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Accept loop; one task per connection, until cancelled.
    pub async fn serve(&self, listener: Listener, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => {
                        let server = self.clone();
                        tokio::spawn(async move { server.handle_connection(conn).await });
                    }
                    Err(e) => tracing::error!(error = %e, "accept error"),
                },
            }
        }
    }

    /// Closes every runtime; the server cannot be used afterwards.
    pub async fn stop(&self) {
        self.supervisor.stop().await;
    }

    /// Reads the request frame and dispatches it. Failures are reported
    /// to the peer as error frames.
    pub async fn handle_connection(&self, mut conn: Connection) {
        let request = match conn.recv::<Request>().await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request");
                return;
            }
        };
        self.serve_request(&mut conn, request).await;
    }

    /// Serves one already-read request; used by hosts that multiplex
    /// several services on one listener.
    pub async fn serve_request(&self, conn: &mut Connection, request: Request) {
        if let Err(e) = self.dispatch(conn, request).await {
            if let Err(send_err) = conn.send_error(e.kind(), e.to_string()).await {
                tracing::debug!(error = %send_err, "failed to report error to peer");
            }
        }
    }

    async fn dispatch(
        &self,
        conn: &mut Connection,
        request: Request,
    ) -> Result<(), ExecutorError> {
        match request {
            Request::Events { build_id, runtime_id, barrier_id } => {
                self.events(conn, &build_id, &runtime_id, &barrier_id).await
            }
            Request::Open { build_id, runtime_id, opts } => {
                let response = self.open(&build_id, &runtime_id, &opts).await?;
                conn.send(&response).await?;
                Ok(())
            }
            Request::Exec { runtime_id, exec_id, barrier_id, opts } => {
                let response = self.exec(&runtime_id, &exec_id, &barrier_id, &opts).await?;
                conn.send(&response).await?;
                Ok(())
            }
            Request::Import => self.import(conn).await,
            Request::Export { runtime_id, export_id, src_path, dest_path, excludes } => {
                self.export(conn, &runtime_id, &export_id, &src_path, dest_path, excludes)
                    .await
            }
            Request::Heartbeat { runtime_id } => {
                validate_heartbeat(&runtime_id)?;
                let extended_by = self.supervisor.extend(&runtime_id)?;
                conn.send(&Response::Heartbeat {
                    extended_by_ms: extended_by.as_millis() as u64,
                })
                .await?;
                Ok(())
            }
            Request::Close { runtime_id, barrier_id } => {
                validate_close(&runtime_id, &barrier_id)?;
                match self.supervisor.close_runtime(&runtime_id, Some(&barrier_id)).await {
                    Ok(()) => {}
                    Err(e @ ExecutorError::NotFound(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(%runtime_id, error = %e, "ignoring error closing runtime")
                    }
                }
                conn.send(&Response::Ok).await?;
                Ok(())
            }
            Request::Introspect => {
                conn.send(&Response::Introspection(self.introspection())).await?;
                Ok(())
            }
            _ => Err(ExecutorError::invalid("unsupported method for this service")),
        }
    }

    /// Attaches the per-runtime event stream: prepares the runtime,
    /// subscribes, publishes the caller's sync point, then forwards
    /// every event until the runtime closes or the peer goes away.
    async fn events(
        &self,
        conn: &mut Connection,
        build_id: &str,
        runtime_id: &str,
        barrier_id: &str,
    ) -> Result<(), ExecutorError> {
        validate_events(build_id, runtime_id, barrier_id)?;
        let prepared = self.supervisor.prepare(build_id, runtime_id)?;
        let cancel = prepared.cancel_token();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = prepared.log().bus().subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        prepared.log().publish(Payload::SyncPointReached {
            barrier_id: barrier_id.to_string(),
        });
        tracing::info!(runtime_id, "event stream opened");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // The runtime is closed; drain what was published
                    // before the cancel, then end the stream.
                    while let Ok(event) = rx.try_recv() {
                        if conn.send(&Response::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => {
                        if conn.send(&Response::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        subscription.unsubscribe();
        tracing::info!(runtime_id, "event stream closed");

        // A dead stream closes the runtime it belonged to.
        if self.supervisor.is_prepared(runtime_id) {
            self.supervisor.discard_prepared(runtime_id);
        } else if let Err(e) = self.supervisor.close_runtime(runtime_id, None).await {
            if !matches!(e, ExecutorError::NotFound(_)) {
                tracing::warn!(runtime_id, error = %e, "ignoring error closing runtime");
            }
        }
        Ok(())
    }

    async fn open(
        &self,
        build_id: &str,
        runtime_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Response, ExecutorError> {
        validate_open(build_id, runtime_id, opts)?;
        tracing::info!(runtime_id, "opening runtime");
        let state = self.supervisor.open(runtime_id, opts).await?;
        tracing::info!(runtime_id, "opened runtime");
        Ok(Response::Opened {
            work_directory: state.runtime().directory().display().to_string(),
            sys_info: SystemInfo::probe(),
        })
    }

    async fn exec(
        &self,
        runtime_id: &str,
        exec_id: &str,
        barrier_id: &str,
        opts: &ExecOpts,
    ) -> Result<Response, ExecutorError> {
        validate_exec(runtime_id, exec_id, barrier_id, opts)?;
        let state = self.supervisor.get(runtime_id)?;
        let log = state.runtime().log().clone();
        log.publish(Payload::ExecStart {
            runtime_id: runtime_id.to_string(),
            exec_id: exec_id.to_string(),
            opts: opts.clone(),
        });
        let result = state.runtime().exec(exec_id, opts).await;
        let status = match &result {
            Ok(res) => ExecStatus::Result { exit_code: res.exit_code },
            Err(e) => ExecStatus::Error { message: e.to_string() },
        };
        log.publish(Payload::ExecEnd {
            runtime_id: runtime_id.to_string(),
            exec_id: exec_id.to_string(),
            status,
        });
        log.publish(Payload::SyncPointReached {
            barrier_id: barrier_id.to_string(),
        });
        let res = result?;
        Ok(Response::ExecResult { exit_code: res.exit_code })
    }

    /// Consumes a mixed client-stream of transfer frames, dispatching
    /// by file id. All frames must share the first frame's runtime and
    /// transfer ids.
    async fn import(&self, conn: &mut Connection) -> Result<(), ExecutorError> {
        let mut receivers: HashMap<String, Receiver> = HashMap::new();
        let result = self.import_inner(conn, &mut receivers).await;
        if result.is_err() {
            for receiver in receivers.values_mut() {
                receiver.cancel().await;
            }
        }
        result
    }

    async fn import_inner(
        &self,
        conn: &mut Connection,
        receivers: &mut HashMap<String, Receiver>,
    ) -> Result<(), ExecutorError> {
        let mut runtime: Option<Arc<OpenRuntime>> = None;
        let mut import_id = String::new();
        loop {
            let frame = match conn.recv::<ImportFrame>().await? {
                Some(frame) => frame,
                None => {
                    return Err(ExecutorError::invalid("import stream ended without commit"));
                }
            };
            let transfer = match frame {
                ImportFrame::Commit => {
                    if !receivers.is_empty() {
                        return Err(ExecutorError::invalid(
                            "import committed with incomplete file transfers",
                        ));
                    }
                    conn.send(&Response::Ok).await?;
                    return Ok(());
                }
                ImportFrame::Transfer(transfer) => transfer,
            };
            validate_file_transfer(&transfer)?;
            if runtime.is_none() {
                import_id = transfer.transfer_id.clone();
                runtime = Some(self.supervisor.get(&transfer.runtime_id)?);
            }
            let state = runtime
                .clone()
                .ok_or_else(|| ExecutorError::invalid("missing runtime"))?;
            if state.runtime().id() != transfer.runtime_id {
                return Err(ExecutorError::invalid("invalid runtime id"));
            }
            if import_id != transfer.transfer_id {
                return Err(ExecutorError::invalid("invalid transfer id"));
            }
            let receiver = receivers
                .entry(transfer.file_id.clone())
                .or_insert_with(|| Receiver::new(state.runtime().fs().clone()));
            let result = receiver.next(&transfer).await;
            if receiver.is_done() {
                receivers.remove(&transfer.file_id);
            }
            result?;
        }
    }

    /// Streams files out of the runtime working directory.
    async fn export(
        &self,
        conn: &mut Connection,
        runtime_id: &str,
        export_id: &str,
        src_path: &str,
        dest_path: String,
        excludes: Vec<String>,
    ) -> Result<(), ExecutorError> {
        validate_export(runtime_id, export_id, src_path)?;
        let state = self.supervisor.get(runtime_id)?;
        let log = state.runtime().log().clone();
        let skip_log = log.clone();
        let opts = SendOptions {
            dest: dest_path,
            excludes,
            on_send: Some(Box::new(move |header| {
                if header.is_dir {
                    log.print(format!(
                        "Exported directory src={}, dest={}, mode={:o}",
                        header.src_path, header.dest_path, header.mode
                    ));
                } else {
                    log.print(format!(
                        "Exported file src={}, dest={}, mode={:o}, size={}",
                        header.src_path, header.dest_path, header.mode, header.size
                    ));
                }
            })),
            on_skip: Some(Box::new(move |path, is_dir, excluded_by| {
                if is_dir {
                    skip_log.print(format!(
                        "Skipped directory export src={path}, excluded_by={excluded_by}"
                    ));
                } else {
                    skip_log.print(format!(
                        "Skipped file export src={path}, excluded_by={excluded_by}"
                    ));
                }
            })),
        };
        let mut sink = ConnSink { conn };
        let mut sender =
            Sender::new(state.runtime().fs().clone(), &mut sink, runtime_id, export_id, opts)?;
        sender.send(src_path).await?;
        conn.send(&Response::TransferDone).await?;
        Ok(())
    }

    fn introspection(&self) -> Introspection {
        let sys_info = SystemInfo::probe();
        let mut labels = vec![sys_info.os.clone(), sys_info.arch.clone()];
        labels.extend(self.config.labels.iter().cloned());
        Introspection {
            sys_info,
            executor_info: ExecutorInfo {
                name: self.config.name.clone(),
            },
            labels,
        }
    }
}

struct ConnSink<'a> {
    conn: &'a mut Connection,
}

#[async_trait::async_trait]
impl FrameSink for ConnSink<'_> {
    async fn send_frame(&mut self, frame: knita_wire::FileTransfer) -> Result<(), TransferError> {
        self.conn
            .send(&Response::Transfer { frame })
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
