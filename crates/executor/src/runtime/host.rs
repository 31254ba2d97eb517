// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Host runtime: a fresh temp directory on the executor host.

use super::{exec_source, ExecResult, Runtime};
use crate::ExecutorError;
use async_trait::async_trait;
use knita_core::{BuildLog, ExecOpts};
use knita_transfer::WorkFs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct HostRuntime {
    runtime_id: String,
    base_dir: PathBuf,
    fs: WorkFs,
    log: BuildLog,
}

impl HostRuntime {
    pub fn new(log: BuildLog, runtime_id: &str) -> Result<Self, ExecutorError> {
        let base_dir = std::env::temp_dir().join(format!("knita-host-{}", runtime_id));
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            runtime_id: runtime_id.to_string(),
            fs: WorkFs::new(&base_dir),
            base_dir,
            log,
        })
    }
}

#[async_trait]
impl Runtime for HostRuntime {
    fn id(&self) -> &str {
        &self.runtime_id
    }

    fn log(&self) -> &BuildLog {
        &self.log
    }

    fn fs(&self) -> &WorkFs {
        &self.fs
    }

    fn directory(&self) -> &Path {
        &self.base_dir
    }

    async fn start(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn exec(&self, exec_id: &str, opts: &ExecOpts) -> Result<ExecResult, ExecutorError> {
        tracing::info!(name = %opts.name, args = ?opts.args, "executing command");
        let system_log = exec_source(&self.log, &self.runtime_id, exec_id, true);
        system_log.print(format!("Executing command: {} {:?}", opts.name, opts.args));

        let mut cmd = tokio::process::Command::new(&opts.name);
        cmd.args(&opts.args)
            .current_dir(&self.base_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Merged over the host environment.
        for pair in &opts.env {
            if let Some((key, value)) = pair.split_once('=') {
                cmd.env(key, value);
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutorError::runtime(format!("failed to spawn {}: {e}", opts.name)))?;

        let exec_log = exec_source(&self.log, &self.runtime_id, exec_id, false);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_pump = stdout.map(|r| pump(r, exec_log.clone(), false));
        let err_pump = stderr.map(|r| pump(r, exec_log.clone(), true));

        let status = child
            .wait()
            .await
            .map_err(|e| ExecutorError::runtime(format!("failed waiting for command: {e}")))?;
        if let Some(handle) = out_pump {
            let _ = handle.await;
        }
        if let Some(handle) = err_pump {
            let _ = handle.await;
        }

        Ok(ExecResult {
            exit_code: status.code().unwrap_or(-1),
        })
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        tokio::fs::remove_dir_all(&self.base_dir).await?;
        Ok(())
    }
}

/// Pumps child output into the log in 4 KiB reads.
pub(crate) fn pump<R>(
    mut reader: R,
    log: BuildLog,
    stderr: bool,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if stderr {
                        log.stderr(buf[..n].to_vec());
                    } else {
                        log.stdout(buf[..n].to_vec());
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
