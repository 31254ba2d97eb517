// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! The director's RPC surface for the pattern subprocess.

use crate::build::Build;
use crate::runtime::RuntimeHandle;
use crate::DirectorError;
use knita_core::{new_id, ExecOpts, ExecStatus, LogSource, Payload, RuntimeOpts};
use knita_wire::{Connection, ExecStreamEvent, Request, Response, WireError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Serves Open/Exec/Import/Export/Close to the pattern SDK over the
/// CLI socket.
pub struct Server {
    build: Arc<Build>,
    runtimes: RwLock<HashMap<String, Arc<RuntimeHandle>>>,
}

impl Server {
    pub fn new(build: Arc<Build>) -> Self {
        Self {
            build,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub fn build(&self) -> &Arc<Build> {
        &self.build
    }

    /// Serves one director request; failures become error frames.
    pub async fn serve_request(
        &self,
        conn: &mut Connection,
        request: Request,
    ) -> Result<(), WireError> {
        let result = match request {
            Request::DirectorOpen { build_id, opts } => self.open(conn, &build_id, opts).await,
            Request::DirectorExec { runtime_id, opts } => self.exec(conn, &runtime_id, opts).await,
            Request::DirectorImport { runtime_id, src_path, dest_path, excludes } => {
                self.import(conn, &runtime_id, &src_path, &dest_path, excludes).await
            }
            Request::DirectorExport { runtime_id, src_path, dest_path, excludes } => {
                self.export(conn, &runtime_id, &src_path, &dest_path, excludes).await
            }
            Request::DirectorClose { runtime_id } => self.close(conn, &runtime_id).await,
            _ => Err(DirectorError::InvalidArgument(
                "unsupported method for this service".to_string(),
            )),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => conn.send_error(e.kind(), e.to_string()).await,
        }
    }

    async fn open(
        &self,
        conn: &mut Connection,
        build_id: &str,
        opts: RuntimeOpts,
    ) -> Result<(), DirectorError> {
        if build_id.is_empty() {
            return Err(DirectorError::InvalidArgument("empty build_id".to_string()));
        }
        if build_id != self.build.build_id() {
            return Err(DirectorError::InvalidArgument("invalid build_id".to_string()));
        }
        let handle = self.build.open_runtime(opts).await?;
        self.runtimes.write().insert(handle.id().to_string(), handle.clone());
        conn.send(&Response::RuntimeOpened {
            runtime_id: handle.id().to_string(),
            work_directory: handle.work_directory(""),
            sys_info: handle.sys_info().clone(),
        })
        .await?;
        Ok(())
    }

    /// Runs an exec, live-forwarding its Start/Stdout/Stderr/End events
    /// on the stream. System-tagged exec output is suppressed.
    async fn exec(
        &self,
        conn: &mut Connection,
        runtime_id: &str,
        opts: ExecOpts,
    ) -> Result<(), DirectorError> {
        if opts.name.is_empty() {
            return Err(DirectorError::InvalidArgument("empty opts name".to_string()));
        }
        let handle = self.get_runtime(runtime_id)?;
        let exec_id = new_id();

        let (tx, mut rx) = mpsc::unbounded_channel::<ExecStreamEvent>();
        let match_runtime = handle.id().to_string();
        let match_exec = exec_id.clone();
        let subscription = self.build.log().bus().subscribe(move |event| {
            let mapped = map_exec_event(&event.payload, &match_runtime, &match_exec);
            if let Some(mapped) = mapped {
                let _ = tx.send(mapped);
            }
        });

        let mut end_sent = false;
        let result = {
            let exec_fut = handle.exec_with_id(&exec_id, opts);
            tokio::pin!(exec_fut);
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        if let Some(event) = event {
                            end_sent |= matches!(event, ExecStreamEvent::End { .. });
                            conn.send(&Response::ExecEvent { event }).await?;
                        }
                    }
                    result = &mut exec_fut => break result,
                }
            }
        };
        subscription.unsubscribe();

        // The barrier guarantees every event for this exec has been
        // republished; drain whatever the loop has not sent yet.
        while let Ok(event) = rx.try_recv() {
            end_sent |= matches!(event, ExecStreamEvent::End { .. });
            conn.send(&Response::ExecEvent { event }).await?;
        }
        if let Err(e) = result {
            if !end_sent {
                conn.send(&Response::ExecEvent {
                    event: ExecStreamEvent::End {
                        status: ExecStatus::Error { message: e.to_string() },
                    },
                })
                .await?;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn import(
        &self,
        conn: &mut Connection,
        runtime_id: &str,
        src_path: &str,
        dest_path: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        if src_path.is_empty() {
            return Err(DirectorError::InvalidArgument("empty source path".to_string()));
        }
        let handle = self.get_runtime(runtime_id)?;
        handle.import(src_path, dest_path, excludes).await?;
        conn.send(&Response::Ok).await?;
        Ok(())
    }

    async fn export(
        &self,
        conn: &mut Connection,
        runtime_id: &str,
        src_path: &str,
        dest_path: &str,
        excludes: Vec<String>,
    ) -> Result<(), DirectorError> {
        if src_path.is_empty() {
            return Err(DirectorError::InvalidArgument("empty src_path".to_string()));
        }
        let handle = self.get_runtime(runtime_id)?;
        handle.export(src_path, dest_path, excludes).await?;
        conn.send(&Response::Ok).await?;
        Ok(())
    }

    async fn close(&self, conn: &mut Connection, runtime_id: &str) -> Result<(), DirectorError> {
        if runtime_id.is_empty() {
            return Err(DirectorError::InvalidArgument("empty runtime_id".to_string()));
        }
        let handle = self
            .runtimes
            .write()
            .remove(runtime_id)
            .ok_or_else(|| DirectorError::NotFound(runtime_id.to_string()))?;
        handle.close().await?;
        conn.send(&Response::Ok).await?;
        Ok(())
    }

    /// Closes every runtime still open; used at build teardown.
    pub async fn close_all(&self) {
        let handles: Vec<Arc<RuntimeHandle>> =
            self.runtimes.write().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.close().await {
                tracing::warn!(runtime_id = %handle.id(), error = %e, "ignoring error closing runtime");
            }
        }
    }

    fn get_runtime(&self, runtime_id: &str) -> Result<Arc<RuntimeHandle>, DirectorError> {
        if runtime_id.is_empty() {
            return Err(DirectorError::InvalidArgument("empty runtime_id".to_string()));
        }
        self.runtimes
            .read()
            .get(runtime_id)
            .cloned()
            .ok_or_else(|| DirectorError::NotFound(runtime_id.to_string()))
    }
}

/// Maps a build-log payload onto the exec stream, filtering by exec
/// identity and suppressing system output.
fn map_exec_event(
    payload: &Payload,
    runtime_id: &str,
    exec_id: &str,
) -> Option<ExecStreamEvent> {
    match payload {
        Payload::ExecStart { runtime_id: r, exec_id: e, .. } if r == runtime_id && e == exec_id => {
            Some(ExecStreamEvent::Start)
        }
        Payload::Stdout {
            data,
            source: LogSource::Exec { runtime_id: r, exec_id: e, system: false },
        } if r == runtime_id && e == exec_id => Some(ExecStreamEvent::Stdout { data: data.clone() }),
        Payload::Stderr {
            data,
            source: LogSource::Exec { runtime_id: r, exec_id: e, system: false },
        } if r == runtime_id && e == exec_id => Some(ExecStreamEvent::Stderr { data: data.clone() }),
        Payload::ExecEnd { runtime_id: r, exec_id: e, status } if r == runtime_id && e == exec_id => {
            Some(ExecStreamEvent::End { status: status.clone() })
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
