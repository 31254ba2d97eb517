// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Runtime backends.
//!
//! A runtime owns an isolated working directory and knows how to run
//! commands inside it. The supervisor drives the lifecycle; backends
//! only implement the contract below.

pub mod docker;
pub mod host;

use crate::ExecutorError;
use async_trait::async_trait;
use knita_core::{BuildLog, ExecOpts, LogSource, RuntimeOpts, RuntimeType};
use knita_transfer::WorkFs;
use std::path::Path;

#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: i32,
}

/// An isolated working environment hosted by this executor.
#[async_trait]
pub trait Runtime: Send + Sync {
    fn id(&self) -> &str;

    /// Event log scoped to this runtime.
    fn log(&self) -> &BuildLog;

    /// Filesystem rooted at the working directory (host side).
    fn fs(&self) -> &WorkFs;

    /// Host path of the working directory.
    fn directory(&self) -> &Path;

    /// Brings the backing resources up. Called exactly once.
    async fn start(&mut self) -> Result<(), ExecutorError>;

    /// Runs one command to completion, streaming output into the log.
    /// A non-zero exit code is a successful result.
    async fn exec(&self, exec_id: &str, opts: &ExecOpts) -> Result<ExecResult, ExecutorError>;

    /// Tears down the backing resources.
    async fn close(&self) -> Result<(), ExecutorError>;
}

/// Builds runtimes for open requests.
#[async_trait]
pub trait RuntimeFactory: Send + Sync + 'static {
    async fn create(
        &self,
        log: BuildLog,
        runtime_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Box<dyn Runtime>, ExecutorError>;
}

/// Default factory: host runtimes in temp directories, docker runtimes
/// through the Docker CLI.
pub struct DefaultRuntimeFactory;

#[async_trait]
impl RuntimeFactory for DefaultRuntimeFactory {
    async fn create(
        &self,
        log: BuildLog,
        runtime_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Box<dyn Runtime>, ExecutorError> {
        match opts.runtime_type {
            RuntimeType::Host => Ok(Box::new(host::HostRuntime::new(log, runtime_id)?)),
            RuntimeType::Docker => {
                let docker_opts = opts
                    .docker
                    .as_ref()
                    .ok_or_else(|| ExecutorError::invalid("no docker options provided"))?;
                Ok(Box::new(docker::DockerRuntime::new(
                    log,
                    runtime_id,
                    docker_opts.clone(),
                )?))
            }
        }
    }
}

/// Log handle for the runtime's own output (not exec output).
pub(crate) fn runtime_source(log: &BuildLog, runtime_id: &str) -> BuildLog {
    log.with_source(LogSource::Runtime {
        runtime_id: runtime_id.to_string(),
    })
}

/// Log handle for one exec's output. `system` marks output produced by
/// the executor itself rather than the user's command.
pub(crate) fn exec_source(log: &BuildLog, runtime_id: &str, exec_id: &str, system: bool) -> BuildLog {
    log.with_source(LogSource::Exec {
        runtime_id: runtime_id.to_string(),
        exec_id: exec_id.to_string(),
        system,
    })
}
