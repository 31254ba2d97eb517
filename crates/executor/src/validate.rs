// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Request validation: every inbound request is checked before any
//! state changes.

use crate::ExecutorError;
use knita_core::{DockerPullAuth, ExecOpts, RuntimeOpts, RuntimeType};
use knita_wire::FileTransfer;

fn require(value: &str, field: &str) -> Result<(), ExecutorError> {
    if value.is_empty() {
        Err(ExecutorError::invalid(format!("empty {field}")))
    } else {
        Ok(())
    }
}

pub fn validate_events(
    build_id: &str,
    runtime_id: &str,
    barrier_id: &str,
) -> Result<(), ExecutorError> {
    require(build_id, "build_id")?;
    require(runtime_id, "runtime_id")?;
    require(barrier_id, "barrier_id")
}

pub fn validate_open(
    build_id: &str,
    runtime_id: &str,
    opts: &RuntimeOpts,
) -> Result<(), ExecutorError> {
    require(build_id, "build_id")?;
    require(runtime_id, "runtime_id")?;
    match opts.runtime_type {
        RuntimeType::Host => Ok(()),
        RuntimeType::Docker => {
            let docker = opts
                .docker
                .as_ref()
                .ok_or_else(|| ExecutorError::invalid("missing docker opts"))?;
            require(&docker.image.image_uri, "docker image uri")?;
            match &docker.image.auth {
                None => Ok(()),
                Some(DockerPullAuth::Basic { username, password }) => {
                    require(username, "docker basic auth username")?;
                    require(password, "docker basic auth password")
                }
                Some(DockerPullAuth::AwsEcr { region, access_key_id, secret_key }) => {
                    require(region, "docker aws ecr region")?;
                    require(access_key_id, "docker aws ecr access key id")?;
                    require(secret_key, "docker aws ecr secret key")
                }
            }
        }
    }
}

pub fn validate_exec(
    runtime_id: &str,
    exec_id: &str,
    barrier_id: &str,
    opts: &ExecOpts,
) -> Result<(), ExecutorError> {
    require(runtime_id, "runtime_id")?;
    require(exec_id, "exec_id")?;
    require(barrier_id, "barrier_id")?;
    require(&opts.name, "name")
}

pub fn validate_file_transfer(frame: &FileTransfer) -> Result<(), ExecutorError> {
    require(&frame.runtime_id, "runtime_id")?;
    require(&frame.transfer_id, "transfer_id")?;
    require(&frame.file_id, "file_id")?;
    if let Some(header) = &frame.header {
        require(&header.src_path, "src_path")?;
        require(&header.dest_path, "dest_path")?;
    }
    if frame.header.is_none() && frame.body.is_none() && frame.trailer.is_none() {
        return Err(ExecutorError::invalid("empty header, body, and trailer"));
    }
    Ok(())
}

pub fn validate_export(
    runtime_id: &str,
    export_id: &str,
    src_path: &str,
) -> Result<(), ExecutorError> {
    require(runtime_id, "runtime_id")?;
    require(export_id, "export_id")?;
    // An empty dest path is valid.
    require(src_path, "src_path")
}

pub fn validate_heartbeat(runtime_id: &str) -> Result<(), ExecutorError> {
    require(runtime_id, "runtime_id")
}

pub fn validate_close(runtime_id: &str, barrier_id: &str) -> Result<(), ExecutorError> {
    require(runtime_id, "runtime_id")?;
    require(barrier_id, "barrier_id")
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
