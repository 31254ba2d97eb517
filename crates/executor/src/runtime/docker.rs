// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Docker runtime: a long-lived container with the working directory
//! bind-mounted.
//!
//! Container lifecycle runs through the Docker CLI: pull, run with a
//! pid-0 sleep loop, exec per command, rm -f on close.

use super::host::pump;
use super::{exec_source, runtime_source, ExecResult, Runtime};
use crate::ExecutorError;
use async_trait::async_trait;
use knita_core::{BuildLog, DockerOpts, DockerPullAuth, ExecOpts, PullStrategy};
use knita_transfer::WorkFs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

const GUEST_WORKSPACE_DIR: &str = "/knita/workspace";
const PID0_COMMAND: &str = "while :; do sleep 2073600; done";

pub struct DockerRuntime {
    runtime_id: String,
    base_dir: PathBuf,
    fs: WorkFs,
    log: BuildLog,
    opts: DockerOpts,
    container_name: String,
    started: parking_lot::Mutex<bool>,
    /// Isolated `docker --config` dir when registry auth is in play.
    auth_config_dir: parking_lot::Mutex<Option<PathBuf>>,
}

impl DockerRuntime {
    pub fn new(log: BuildLog, runtime_id: &str, opts: DockerOpts) -> Result<Self, ExecutorError> {
        let base_dir = std::env::temp_dir().join(format!("knita-docker-{}", runtime_id));
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            runtime_id: runtime_id.to_string(),
            fs: WorkFs::new(&base_dir),
            base_dir,
            log,
            opts,
            container_name: format!("knita-{runtime_id}"),
            started: parking_lot::Mutex::new(false),
            auth_config_dir: parking_lot::Mutex::new(None),
        })
    }

    fn config_args(&self) -> Vec<String> {
        match self.auth_config_dir.lock().as_ref() {
            Some(dir) => vec!["--config".to_string(), dir.display().to_string()],
            None => Vec::new(),
        }
    }

    async fn docker(&self, args: &[String]) -> Result<std::process::Output, ExecutorError> {
        let output = tokio::process::Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecutorError::runtime(format!("failed to run docker: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutorError::runtime(format!(
                "docker {} failed: {}",
                args.first().map(String::as_str).unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    async fn image_exists(&self) -> bool {
        tokio::process::Command::new("docker")
            .args(["image", "inspect", &self.opts.image.image_uri])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn image_is_latest(&self) -> bool {
        let uri = &self.opts.image.image_uri;
        match uri.rsplit_once(':') {
            // A ':' inside the last path segment is a tag; otherwise the
            // uri is untagged and implicitly latest.
            Some((_, tag)) if !tag.contains('/') => tag == "latest",
            _ => true,
        }
    }

    /// Exchanges configured credentials for a `docker login` against an
    /// isolated config dir, so pulls pick them up without touching the
    /// host's docker config.
    async fn login(&self, auth: &DockerPullAuth, log: &BuildLog) -> Result<(), ExecutorError> {
        let config_dir = std::env::temp_dir().join(format!("knita-docker-auth-{}", self.runtime_id));
        tokio::fs::create_dir_all(&config_dir).await?;
        *self.auth_config_dir.lock() = Some(config_dir.clone());

        let registry = self
            .opts
            .image
            .image_uri
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let (username, password) = match auth {
            DockerPullAuth::Basic { username, password } => {
                log.print("Using Docker registry auth: Basic");
                (username.clone(), password.clone())
            }
            DockerPullAuth::AwsEcr { region, access_key_id, secret_key } => {
                log.print("Using Docker registry auth: AWS ECR");
                let output = tokio::process::Command::new("aws")
                    .args(["ecr", "get-login-password", "--region", region])
                    .env("AWS_ACCESS_KEY_ID", access_key_id)
                    .env("AWS_SECRET_ACCESS_KEY", secret_key)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| ExecutorError::runtime(format!("failed to run aws: {e}")))?;
                if !output.status.success() {
                    return Err(ExecutorError::runtime(format!(
                        "aws ecr get-login-password failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                ("AWS".to_string(), token)
            }
        };

        use tokio::io::AsyncWriteExt;
        let mut child = tokio::process::Command::new("docker")
            .args([
                "--config",
                &config_dir.display().to_string(),
                "login",
                "--username",
                &username,
                "--password-stdin",
                &registry,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutorError::runtime(format!("failed to run docker login: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(password.as_bytes()).await?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecutorError::runtime(format!("failed waiting for docker login: {e}")))?;
        if !output.status.success() {
            return Err(ExecutorError::runtime(format!(
                "docker login failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn pull_image(&self) -> Result<(), ExecutorError> {
        let pull_log = runtime_source(&self.log, &self.runtime_id);
        let image = &self.opts.image;
        let exists = self.image_exists().await;
        match image.pull_strategy {
            PullStrategy::Never => {
                pull_log.print(format!(
                    "Docker pull strategy is \"never\"; {} will not be pulled",
                    image.image_uri
                ));
                return Ok(());
            }
            PullStrategy::NotExists if exists => {
                pull_log.print(format!(
                    "Docker pull strategy is \"if-not-exists\" and image exists in cache; {} will not be pulled",
                    image.image_uri
                ));
                return Ok(());
            }
            PullStrategy::Unspecified if exists && !self.image_is_latest() => {
                pull_log.print(format!(
                    "Docker pull strategy is \"default\", image exists in cache and is not latest; {} will not be pulled",
                    image.image_uri
                ));
                return Ok(());
            }
            _ => {}
        }

        if let Some(auth) = &image.auth {
            self.login(auth, &pull_log).await?;
        } else {
            pull_log.print("Using Docker registry auth: None");
        }
        pull_log.print(format!("Pulling image: {}", image.image_uri));
        let mut args = self.config_args();
        args.extend(["pull".to_string(), image.image_uri.clone()]);
        self.docker(&args).await?;
        Ok(())
    }

    async fn image_os(&self) -> Result<String, ExecutorError> {
        let output = self
            .docker(&[
                "image".to_string(),
                "inspect".to_string(),
                "-f".to_string(),
                "{{.Os}}".to_string(),
                self.opts.image.image_uri.clone(),
            ])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Substitutes the host working directory for the guest path in env
    /// values, so paths handed to the pattern keep working in-container.
    fn fix_env(&self, env: &[String]) -> Vec<String> {
        let host_prefix = self.base_dir.display().to_string();
        env.iter()
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) if value.starts_with(&host_prefix) => {
                    format!("{key}={}", value.replacen(&host_prefix, GUEST_WORKSPACE_DIR, 1))
                }
                _ => pair.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
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
        {
            let mut started = self.started.lock();
            if *started {
                return Err(ExecutorError::runtime("docker runtime already started"));
            }
            *started = true;
        }
        self.pull_image().await?;
        let os = self.image_os().await?;
        if os != "linux" {
            return Err(ExecutorError::runtime(format!("unsupported image OS: {os}")));
        }
        tracing::info!(container = %self.container_name, image = %self.opts.image.image_uri, "starting container");
        let mut args = self.config_args();
        for arg in [
            "run",
            "-d",
            "--name",
            self.container_name.as_str(),
            "-v",
            &format!("{}:{}:rw", self.base_dir.display(), GUEST_WORKSPACE_DIR),
            "-w",
            GUEST_WORKSPACE_DIR,
            "--entrypoint",
            "/bin/sh",
            self.opts.image.image_uri.as_str(),
            "-c",
            PID0_COMMAND,
        ] {
            args.push(arg.to_string());
        }
        self.docker(&args).await?;
        Ok(())
    }

    async fn exec(&self, exec_id: &str, opts: &ExecOpts) -> Result<ExecResult, ExecutorError> {
        tracing::info!(name = %opts.name, args = ?opts.args, "executing command in container");
        let system_log = exec_source(&self.log, &self.runtime_id, exec_id, true);
        system_log.print(format!("Executing command: {} {:?}", opts.name, opts.args));

        let mut cmd = tokio::process::Command::new("docker");
        cmd.args(["exec", "-w", GUEST_WORKSPACE_DIR]);
        for pair in self.fix_env(&opts.env) {
            cmd.args(["-e", &pair]);
        }
        cmd.arg(&self.container_name).arg(&opts.name).args(&opts.args);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutorError::runtime(format!("failed to spawn docker exec: {e}")))?;

        let exec_log = exec_source(&self.log, &self.runtime_id, exec_id, false);
        let out_pump = child.stdout.take().map(|r| pump(r, exec_log.clone(), false));
        let err_pump = child.stderr.take().map(|r| pump(r, exec_log.clone(), true));

        let status = child
            .wait()
            .await
            .map_err(|e| ExecutorError::runtime(format!("failed waiting for docker exec: {e}")))?;
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
        let started = *self.started.lock();
        if started {
            let _ = self
                .docker(&["rm".to_string(), "-f".to_string(), self.container_name.clone()])
                .await;
        }
        if let Some(config_dir) = self.auth_config_dir.lock().take() {
            let _ = std::fs::remove_dir_all(config_dir);
        }
        tokio::fs::remove_dir_all(&self.base_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
